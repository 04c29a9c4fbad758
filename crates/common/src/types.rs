//! Core types for tfprobe

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::resource_id::ResourceId;

/// Service principal credentials used by both Terraform and the ARM client
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl Credentials {
    /// Load credentials from the process environment.
    ///
    /// `ARM_*` names (what the azurerm provider reads) win over `AZURE_*`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load credentials through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |arm: &'static str, azure: &'static str| -> Result<String> {
            lookup(arm)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(azure).filter(|v| !v.trim().is_empty()))
                .ok_or(Error::MissingCredential(arm))
        };

        Ok(Self {
            client_id: get("ARM_CLIENT_ID", "AZURE_CLIENT_ID")?,
            client_secret: get("ARM_CLIENT_SECRET", "AZURE_CLIENT_SECRET")?,
            tenant_id: get("ARM_TENANT_ID", "AZURE_TENANT_ID")?,
            subscription_id: get("ARM_SUBSCRIPTION_ID", "AZURE_SUBSCRIPTION_ID")?,
        })
    }

    /// Environment entries for the terraform process
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ARM_CLIENT_ID", self.client_id.clone()),
            ("ARM_CLIENT_SECRET", self.client_secret.clone()),
            ("ARM_TENANT_ID", self.tenant_id.clone()),
            ("ARM_SUBSCRIPTION_ID", self.subscription_id.clone()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// A value passed to terraform via `-var`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(i64),
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl VariableValue {
    /// Render the value as terraform expects it on the command line.
    ///
    /// Lists and maps are emitted as JSON, which HCL accepts as expressions.
    pub fn render(&self) -> String {
        match self {
            VariableValue::Bool(b) => b.to_string(),
            VariableValue::Number(n) => n.to_string(),
            VariableValue::String(s) => s.clone(),
            VariableValue::List(items) => {
                serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
            }
            VariableValue::Map(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::String(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::String(s)
    }
}

/// Storage account replication types accepted by azurerm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationType {
    #[serde(rename = "LRS")]
    Lrs,
    #[serde(rename = "GRS")]
    Grs,
    #[serde(rename = "ZRS")]
    Zrs,
    #[serde(rename = "RAGRS")]
    Ragrs,
    #[serde(rename = "GZRS")]
    Gzrs,
    #[serde(rename = "RAGZRS")]
    Ragzrs,
}

impl Default for ReplicationType {
    fn default() -> Self {
        Self::Lrs
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationType::Lrs => write!(f, "LRS"),
            ReplicationType::Grs => write!(f, "GRS"),
            ReplicationType::Zrs => write!(f, "ZRS"),
            ReplicationType::Ragrs => write!(f, "RAGRS"),
            ReplicationType::Gzrs => write!(f, "GZRS"),
            ReplicationType::Ragzrs => write!(f, "RAGZRS"),
        }
    }
}

/// Input variables recognized by the environment stack and its modules.
///
/// Unset fields are not passed to terraform, so module defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentVariables {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub location_short: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub resource_group_name: Option<String>,
    #[serde(default)]
    pub random_suffix: Option<String>,
    #[serde(default)]
    pub aks_node_count: Option<u32>,
    #[serde(default)]
    pub kubernetes_version: Option<String>,
    #[serde(default)]
    pub sql_administrator_login: Option<String>,
    #[serde(default)]
    pub sql_administrator_password: Option<String>,
    #[serde(default)]
    pub sql_database_name: Option<String>,
    #[serde(default)]
    pub aks_admin_group_object_ids: Option<Vec<String>>,
    #[serde(default)]
    pub keyvault_admin_object_ids: Option<Vec<String>>,
    /// AKS module: admin public key for the node pools
    #[serde(default)]
    pub ssh_public_key: Option<String>,
    /// AKS module: Entra ID groups granted cluster admin
    #[serde(default)]
    pub admin_group_object_ids: Option<Vec<String>>,
    /// Key Vault module: kubelet identity granted secret access
    #[serde(default)]
    pub aks_kubelet_identity_object_id: Option<String>,
    #[serde(default)]
    pub storage_account_replication_type: Option<ReplicationType>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    /// ARM ids wired into module inputs, e.g. `subnet_id` or `vnet_id`
    #[serde(default)]
    pub resource_refs: BTreeMap<String, String>,
}

const TYPED_NAMES: &[&str] = &[
    "prefix",
    "environment",
    "location",
    "location_short",
    "project_name",
    "resource_group_name",
    "random_suffix",
    "aks_node_count",
    "kubernetes_version",
    "sql_administrator_login",
    "sql_administrator_password",
    "sql_database_name",
    "aks_admin_group_object_ids",
    "keyvault_admin_object_ids",
    "ssh_public_key",
    "admin_group_object_ids",
    "aks_kubelet_identity_object_id",
    "storage_account_replication_type",
    "cost_center",
    "owner",
    "tags",
];

const MAX_PREFIX_LEN: usize = 16;

impl DeploymentVariables {
    /// Check every set field against the rules the configurations impose
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            if prefix.is_empty() {
                return Err(Error::variable("prefix", "must not be empty"));
            }
            if prefix.len() > MAX_PREFIX_LEN {
                return Err(Error::variable(
                    "prefix",
                    format!("must be at most {} characters", MAX_PREFIX_LEN),
                ));
            }
            if !prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(Error::variable(
                    "prefix",
                    "may only contain lowercase letters, digits and '-'",
                ));
            }
        }

        if let Some(location) = &self.location {
            if location.trim().is_empty() {
                return Err(Error::variable("location", "must not be empty"));
            }
        }

        if let Some(count) = self.aks_node_count {
            if count == 0 {
                return Err(Error::variable("aks_node_count", "must be at least 1"));
            }
        }

        if let Some(password) = &self.sql_administrator_password {
            validate_password(password)?;
        }

        if let Some(key) = &self.ssh_public_key {
            if !SSH_KEY_TYPES.iter().any(|t| key.starts_with(t)) {
                return Err(Error::variable(
                    "ssh_public_key",
                    "must be an OpenSSH public key (ssh-rsa, ssh-ed25519 or ecdsa-sha2-*)",
                ));
            }
        }

        let object_ids = self
            .aks_admin_group_object_ids
            .iter()
            .map(|ids| ("aks_admin_group_object_ids", ids.as_slice()))
            .chain(
                self.keyvault_admin_object_ids
                    .iter()
                    .map(|ids| ("keyvault_admin_object_ids", ids.as_slice())),
            )
            .chain(
                self.admin_group_object_ids
                    .iter()
                    .map(|ids| ("admin_group_object_ids", ids.as_slice())),
            )
            .chain(
                self.aks_kubelet_identity_object_id
                    .as_ref()
                    .map(|id| ("aks_kubelet_identity_object_id", std::slice::from_ref(id))),
            );
        for (name, ids) in object_ids {
            if ids.iter().any(|id| !is_object_id(id)) {
                return Err(Error::variable(
                    name,
                    "object ids must be non-empty and contain no whitespace or '/'",
                ));
            }
        }

        for (name, value) in &self.resource_refs {
            if TYPED_NAMES.contains(&name.as_str()) {
                return Err(Error::variable(
                    name,
                    "is a typed variable and cannot be set as a resource reference",
                ));
            }
            ResourceId::parse(value).map_err(|e| Error::variable(name, e.to_string()))?;
        }

        Ok(())
    }

    /// Flatten the set fields into `(name, value)` pairs, sorted by name
    pub fn to_pairs(&self) -> Vec<(String, VariableValue)> {
        let mut out: BTreeMap<String, VariableValue> = BTreeMap::new();

        let mut put_str = |name: &str, value: &Option<String>| {
            if let Some(v) = value {
                out.insert(name.to_string(), VariableValue::String(v.clone()));
            }
        };
        put_str("prefix", &self.prefix);
        put_str("environment", &self.environment);
        put_str("location", &self.location);
        put_str("location_short", &self.location_short);
        put_str("project_name", &self.project_name);
        put_str("resource_group_name", &self.resource_group_name);
        put_str("random_suffix", &self.random_suffix);
        put_str("kubernetes_version", &self.kubernetes_version);
        put_str("sql_administrator_login", &self.sql_administrator_login);
        put_str("sql_administrator_password", &self.sql_administrator_password);
        put_str("sql_database_name", &self.sql_database_name);
        put_str("cost_center", &self.cost_center);
        put_str("owner", &self.owner);
        put_str("ssh_public_key", &self.ssh_public_key);
        put_str(
            "aks_kubelet_identity_object_id",
            &self.aks_kubelet_identity_object_id,
        );

        if let Some(count) = self.aks_node_count {
            out.insert("aks_node_count".to_string(), VariableValue::Number(count as i64));
        }
        if let Some(ids) = &self.aks_admin_group_object_ids {
            out.insert(
                "aks_admin_group_object_ids".to_string(),
                VariableValue::List(ids.clone()),
            );
        }
        if let Some(ids) = &self.keyvault_admin_object_ids {
            out.insert(
                "keyvault_admin_object_ids".to_string(),
                VariableValue::List(ids.clone()),
            );
        }
        if let Some(ids) = &self.admin_group_object_ids {
            out.insert(
                "admin_group_object_ids".to_string(),
                VariableValue::List(ids.clone()),
            );
        }
        if let Some(replication) = self.storage_account_replication_type {
            out.insert(
                "storage_account_replication_type".to_string(),
                VariableValue::String(replication.to_string()),
            );
        }
        if let Some(tags) = &self.tags {
            out.insert("tags".to_string(), VariableValue::Map(tags.clone()));
        }
        for (name, value) in &self.resource_refs {
            out.insert(name.clone(), VariableValue::String(value.clone()));
        }

        out.into_iter().collect()
    }

    /// Names whose values must not show up in logs
    pub fn is_sensitive(name: &str) -> bool {
        name.contains("password") || name.contains("secret")
    }
}

const SSH_KEY_TYPES: &[&str] = &["ssh-rsa ", "ssh-ed25519 ", "ecdsa-sha2-"];

/// Entra ID object ids are GUIDs, but placeholder ids are common in plans
fn is_object_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.chars().any(char::is_whitespace)
}

fn validate_password(password: &str) -> Result<()> {
    const NAME: &str = "sql_administrator_password";
    if password.chars().count() < 8 {
        return Err(Error::variable(NAME, "must be at least 8 characters"));
    }
    let classes = [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    if classes.iter().filter(|present| **present).count() < 3 {
        return Err(Error::variable(
            NAME,
            "must contain three of: uppercase, lowercase, digit, symbol",
        ));
    }
    Ok(())
}

/// A value published by `terraform output`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputValue {
    Scalar(String),
    List(Vec<String>),
}

impl OutputValue {
    /// Convert the `value` field of `terraform output -json`
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => OutputValue::Scalar(s.clone()),
            serde_json::Value::Array(items) => OutputValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            serde_json::Value::Null => OutputValue::Scalar(String::new()),
            other => OutputValue::Scalar(other.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutputValue::Scalar(_) => "scalar",
            OutputValue::List(_) => "list",
        }
    }
}

/// Kinds of live resources the verifier knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    VirtualNetwork,
    ManagedCluster,
    StorageAccount,
    KeyVault,
    SqlServer,
    SqlDatabase,
}

impl ResourceKind {
    /// ARM provider path segment, relative to the resource group
    pub fn provider_path(&self) -> &'static str {
        match self {
            ResourceKind::VirtualNetwork => "Microsoft.Network/virtualNetworks",
            ResourceKind::ManagedCluster => "Microsoft.ContainerService/managedClusters",
            ResourceKind::StorageAccount => "Microsoft.Storage/storageAccounts",
            ResourceKind::KeyVault => "Microsoft.KeyVault/vaults",
            ResourceKind::SqlServer | ResourceKind::SqlDatabase => "Microsoft.Sql/servers",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::VirtualNetwork => write!(f, "virtual network"),
            ResourceKind::ManagedCluster => write!(f, "managed cluster"),
            ResourceKind::StorageAccount => write!(f, "storage account"),
            ResourceKind::KeyVault => write!(f, "key vault"),
            ResourceKind::SqlServer => write!(f, "sql server"),
            ResourceKind::SqlDatabase => write!(f, "sql database"),
        }
    }
}

/// Snapshot of a live resource as reported by the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl RemoteResource {
    /// Build a snapshot from an ARM GET response body
    pub fn from_arm(kind: ResourceKind, body: &serde_json::Value) -> Self {
        let text = |key: &str| {
            body.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let tags = body
            .get("tags")
            .and_then(|t| t.as_object())
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            kind,
            id: text("id"),
            name: text("name"),
            location: text("location"),
            tags,
            properties: body
                .get("properties")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        }
    }

    /// Look up a nested property by a dotted path such as `encryption.services.blob.enabled`
    pub fn property(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.')
            .try_fold(&self.properties, |value, key| value.get(key))
    }

    pub fn bool_property(&self, path: &str) -> Option<bool> {
        self.property(path).and_then(|v| v.as_bool())
    }

    pub fn str_property(&self, path: &str) -> Option<&str> {
        self.property(path).and_then(|v| v.as_str())
    }
}
