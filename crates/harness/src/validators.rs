//! Validation checks for deployed resources
//!
//! One parameterized validator per resource area. Output names default to
//! what the environment stack publishes and can be overridden per scenario,
//! so the same validator covers single-module runs too. Optional output names
//! set to `null` skip that assertion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use tfprobe_common::naming::is_valid_storage_account_name;
use tfprobe_common::{RemoteResource, ResourceId, ResourceKind};

use crate::assertions::Assertions;
use crate::azure::{CloudInspector, ResourceRequest};
use crate::outputs::Outputs;

/// What a validator can look at
pub struct ValidationContext<'a> {
    pub outputs: &'a Outputs,
    pub inspector: Option<&'a dyn CloudInspector>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(outputs: &'a Outputs, inspector: Option<&'a dyn CloudInspector>) -> Self {
        Self { outputs, inspector }
    }

    /// Fetch the live resource behind an ARM id, recording any failure
    pub async fn live(
        &self,
        a: &mut Assertions,
        kind: ResourceKind,
        id: &str,
    ) -> Option<RemoteResource> {
        let Some(inspector) = self.inspector else {
            warn!("[{}] no cloud inspector configured, skipping live {} check", a.check(), kind);
            a.mark_live_skipped();
            return None;
        };

        let parsed = match ResourceId::parse(id) {
            Ok(parsed) => parsed,
            Err(e) => {
                a.fail(format!("live {} lookup: {}", kind, e));
                return None;
            }
        };

        let mut request = ResourceRequest::new(kind, &parsed.resource_group, parsed.name());
        if kind == ResourceKind::SqlDatabase {
            request.parent = parsed.parent_name().map(str::to_string);
        }

        match inspector.get_resource(&request).await {
            Ok(resource) => {
                if let Some(state) = resource.provisioning_state() {
                    a.is_true(
                        state == "Succeeded",
                        format!("{} {} is in provisioning state {}", kind, resource.name, state),
                    );
                }
                Some(resource)
            }
            Err(e) => {
                a.error(&format!("live {} {}", kind, parsed.name()), &e);
                None
            }
        }
    }
}

/// A named validation run against a deployment
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions);
}

/// Checks selectable from scenario specs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckSpec {
    Networking(NetworkingCheck),
    Aks(AksCheck),
    Storage(StorageCheck),
    KeyVault(KeyVaultCheck),
    Sql(SqlCheck),
    PrivateEndpoints(PrivateEndpointsCheck),
    ApplicationGateway(ApplicationGatewayCheck),
    Outputs(OutputsCheck),
}

impl CheckSpec {
    pub fn into_validator(self) -> Arc<dyn Validator> {
        match self {
            CheckSpec::Networking(c) => Arc::new(c),
            CheckSpec::Aks(c) => Arc::new(c),
            CheckSpec::Storage(c) => Arc::new(c),
            CheckSpec::KeyVault(c) => Arc::new(c),
            CheckSpec::Sql(c) => Arc::new(c),
            CheckSpec::PrivateEndpoints(c) => Arc::new(c),
            CheckSpec::ApplicationGateway(c) => Arc::new(c),
            CheckSpec::Outputs(c) => Arc::new(c),
        }
    }
}

fn some(name: &str) -> Option<String> {
    Some(name.to_string())
}

// =============================================================================
// Networking
// =============================================================================

/// Hub-spoke topology, subnets and private DNS zones
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkingCheck {
    pub hub_vnet_output: String,
    pub spoke_vnets_output: Option<String>,
    pub appgw_subnet_output: Option<String>,
    pub aks_subnets_output: Option<String>,
    pub keyvault_dns_zone_output: Option<String>,
    pub sql_dns_zone_output: Option<String>,
    pub live: bool,
}

impl Default for NetworkingCheck {
    fn default() -> Self {
        Self {
            hub_vnet_output: "hub_vnet_id".to_string(),
            spoke_vnets_output: some("spoke_vnet_ids"),
            appgw_subnet_output: some("appgw_subnet_id"),
            aks_subnets_output: some("aks_subnet_ids"),
            keyvault_dns_zone_output: some("private_dns_zone_keyvault_id"),
            sql_dns_zone_output: some("private_dns_zone_sql_id"),
            live: true,
        }
    }
}

#[async_trait]
impl Validator for NetworkingCheck {
    fn name(&self) -> &str {
        "networking"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        let outputs = ctx.outputs;

        let hub = a
            .output(outputs, &self.hub_vnet_output)
            .map(str::to_string);
        if let Some(hub) = &hub {
            a.contains(&self.hub_vnet_output, hub, "/virtualNetworks/");
        }

        if let Some(name) = &self.spoke_vnets_output {
            if let Some(spokes) = a.output_list(outputs, name) {
                for spoke in spokes {
                    a.contains(name, spoke, "/virtualNetworks/");
                }
            }
        }
        let appgw_subnet = self.appgw_subnet_output.as_ref().and_then(|name| {
            let value = a.output(outputs, name)?;
            a.contains(name, value, "/subnets/").then(|| value.to_string())
        });
        if let Some(name) = &self.aks_subnets_output {
            a.output_list(outputs, name);
        }
        if let Some(name) = &self.keyvault_dns_zone_output {
            a.output_contains(outputs, name, "privatelink.vaultcore.azure.net");
        }
        if let Some(name) = &self.sql_dns_zone_output {
            a.output_contains(outputs, name, "privatelink.database.windows.net");
        }

        if !self.live {
            return;
        }
        if let Some(hub) = hub {
            if let Some(vnet) = ctx.live(a, ResourceKind::VirtualNetwork, &hub).await {
                a.is_true(
                    !vnet.address_prefixes().is_empty(),
                    format!("virtual network {} should have an address prefix", vnet.name),
                );
                // The gateway subnet lives in the hub.
                if let Some(subnet) = appgw_subnet.and_then(|id| ResourceId::parse(&id).ok()) {
                    if subnet.parent_name() == Some(vnet.name.as_str()) {
                        a.is_true(
                            vnet.subnet_names().iter().any(|n| n == subnet.name()),
                            format!(
                                "virtual network {} should contain subnet {}",
                                vnet.name,
                                subnet.name()
                            ),
                        );
                    }
                }
            }
        }
    }
}

// =============================================================================
// AKS
// =============================================================================

/// Managed cluster identity, OIDC issuer and private API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AksCheck {
    pub cluster_name_output: String,
    pub cluster_id_output: String,
    pub oidc_issuer_output: Option<String>,
    pub agic_client_id_output: Option<String>,
    /// Naming convention: the cluster name must contain this (case-insensitive)
    pub name_contains: Option<String>,
    pub require_private_cluster: bool,
    pub live: bool,
}

impl Default for AksCheck {
    fn default() -> Self {
        Self {
            cluster_name_output: "aks_cluster_name".to_string(),
            cluster_id_output: "aks_cluster_id".to_string(),
            oidc_issuer_output: some("aks_oidc_issuer_url"),
            agic_client_id_output: some("agic_client_id"),
            name_contains: None,
            require_private_cluster: true,
            live: true,
        }
    }
}

#[async_trait]
impl Validator for AksCheck {
    fn name(&self) -> &str {
        "aks"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        let outputs = ctx.outputs;

        if let Some(name) = a.output(outputs, &self.cluster_name_output) {
            if let Some(fragment) = &self.name_contains {
                a.is_true(
                    name.to_lowercase().contains(&fragment.to_lowercase()),
                    format!("cluster name '{}' should contain '{}'", name, fragment),
                );
            }
        }

        let id = a
            .output(outputs, &self.cluster_id_output)
            .map(str::to_string);
        if let Some(id) = &id {
            a.contains(&self.cluster_id_output, id, "/managedClusters/");
        }

        let oidc_issuer = self.oidc_issuer_output.as_ref().and_then(|name| {
            let url = a.output(outputs, name)?;
            a.starts_with(name, url, "https://");
            Some(url.to_string())
        });
        if let Some(name) = &self.agic_client_id_output {
            a.output(outputs, name);
        }

        if !self.live {
            return;
        }
        if let Some(id) = id {
            if let Some(cluster) = ctx.live(a, ResourceKind::ManagedCluster, &id).await {
                if let (Some(expected), Some(live)) = (&oidc_issuer, cluster.oidc_issuer_url()) {
                    a.equals("oidcIssuerProfile.issuerURL", &live, &expected.as_str());
                }
                if self.require_private_cluster {
                    let private = cluster.private_cluster_enabled();
                    a.is_true(
                        private == Some(true),
                        format!(
                            "cluster {} should be private, enablePrivateCluster is {}",
                            cluster.name,
                            private.map(|p| p.to_string()).unwrap_or_else(|| "unset".into())
                        ),
                    );
                }
            }
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Storage account naming, private endpoint and hardening flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageCheck {
    pub name_output: String,
    pub id_output: String,
    pub private_endpoint_output: Option<String>,
    /// Required name prefix, e.g. `st`
    pub name_prefix: Option<String>,
    pub min_tls_version: String,
    pub require_private_access: bool,
    pub live: bool,
}

impl Default for StorageCheck {
    fn default() -> Self {
        Self {
            name_output: "storage_account_name".to_string(),
            id_output: "storage_account_id".to_string(),
            private_endpoint_output: some("storage_blob_private_endpoint_id"),
            name_prefix: None,
            min_tls_version: "TLS1_2".to_string(),
            require_private_access: false,
            live: true,
        }
    }
}

#[async_trait]
impl Validator for StorageCheck {
    fn name(&self) -> &str {
        "storage"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        let outputs = ctx.outputs;

        if let Some(name) = a.output(outputs, &self.name_output) {
            a.is_true(
                (3..=24).contains(&name.len()),
                format!("storage account name '{}' should be 3-24 characters", name),
            );
            a.equals(&self.name_output, &name.to_string(), &name.to_lowercase());
            a.is_true(
                is_valid_storage_account_name(name),
                format!("storage account name '{}' should be lowercase alphanumeric", name),
            );
            if let Some(prefix) = &self.name_prefix {
                a.contains(&self.name_output, name, prefix);
            }
        }

        let id = a.output(outputs, &self.id_output).map(str::to_string);
        if let Some(id) = &id {
            a.contains(&self.id_output, id, "/storageAccounts/");
        }
        if let Some(name) = &self.private_endpoint_output {
            a.output_contains(outputs, name, "/privateEndpoints/");
        }

        if !self.live {
            return;
        }
        let Some(id) = id else { return };
        let Some(account) = ctx.live(a, ResourceKind::StorageAccount, &id).await else {
            return;
        };

        a.equals(
            "minimumTlsVersion",
            &account.minimum_tls_version(),
            &Some(self.min_tls_version.as_str()),
        );
        a.is_true(
            account.blob_public_access_allowed() != Some(true),
            format!("storage account {} should not allow blob public access", account.name),
        );
        a.is_true(
            account.https_only() != Some(false),
            format!("storage account {} should only accept HTTPS", account.name),
        );
        a.equals(
            "encryption.services.blob.enabled",
            &account.blob_encryption_enabled(),
            &Some(true),
        );
        if self.require_private_access {
            a.equals("publicNetworkAccess", &account.public_network_access(), &Some("Disabled"));
        }
    }
}

// =============================================================================
// Key Vault
// =============================================================================

/// Vault identity, URI, private endpoint and deletion protection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyVaultCheck {
    pub name_output: String,
    pub id_output: String,
    pub uri_output: Option<String>,
    pub private_endpoint_output: Option<String>,
    /// Required name prefix, e.g. `kv-`
    pub name_prefix: Option<String>,
    pub require_private_access: bool,
    pub live: bool,
}

impl Default for KeyVaultCheck {
    fn default() -> Self {
        Self {
            name_output: "keyvault_name".to_string(),
            id_output: "keyvault_id".to_string(),
            uri_output: some("keyvault_uri"),
            private_endpoint_output: some("keyvault_private_endpoint_id"),
            name_prefix: None,
            require_private_access: true,
            live: true,
        }
    }
}

#[async_trait]
impl Validator for KeyVaultCheck {
    fn name(&self) -> &str {
        "key_vault"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        let outputs = ctx.outputs;

        if let Some(name) = a.output(outputs, &self.name_output) {
            if let Some(prefix) = &self.name_prefix {
                a.contains(&self.name_output, name, prefix);
            }
        }
        let id = a.output(outputs, &self.id_output).map(str::to_string);
        if let Some(id) = &id {
            a.contains(&self.id_output, id, "/vaults/");
        }
        if let Some(name) = &self.private_endpoint_output {
            a.output_contains(outputs, name, "/privateEndpoints/");
        }
        if let Some(name) = &self.uri_output {
            if let Some(uri) = a.output(outputs, name) {
                a.starts_with(name, uri, "https://");
                a.contains(name, uri, ".vault.azure.net");
            }
        }

        if !self.live {
            return;
        }
        let Some(id) = id else { return };
        let Some(vault) = ctx.live(a, ResourceKind::KeyVault, &id).await else {
            return;
        };

        // Soft delete is on unless explicitly disabled on older vaults.
        a.is_true(
            vault.soft_delete_enabled() != Some(false),
            format!("key vault {} should have soft delete enabled", vault.name),
        );
        a.equals("enablePurgeProtection", &vault.purge_protection_enabled(), &Some(true));
        if self.require_private_access {
            a.equals("publicNetworkAccess", &vault.public_network_access(), &Some("Disabled"));
        }
    }
}

// =============================================================================
// SQL
// =============================================================================

/// SQL server and database identity, FQDN, private endpoint and TLS floor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlCheck {
    pub server_name_output: String,
    pub server_id_output: String,
    pub database_name_output: Option<String>,
    pub database_id_output: Option<String>,
    pub private_endpoint_output: Option<String>,
    pub fqdn_output: Option<String>,
    pub min_tls_version: String,
    pub require_private_access: bool,
    pub live: bool,
}

impl Default for SqlCheck {
    fn default() -> Self {
        Self {
            server_name_output: "sql_server_name".to_string(),
            server_id_output: "sql_server_id".to_string(),
            database_name_output: some("sql_database_name"),
            database_id_output: some("sql_database_id"),
            private_endpoint_output: some("sql_private_endpoint_id"),
            fqdn_output: some("sql_server_fqdn"),
            min_tls_version: "1.2".to_string(),
            require_private_access: true,
            live: true,
        }
    }
}

#[async_trait]
impl Validator for SqlCheck {
    fn name(&self) -> &str {
        "sql"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        let outputs = ctx.outputs;

        a.output(outputs, &self.server_name_output);
        let server_id = a
            .output(outputs, &self.server_id_output)
            .map(str::to_string);
        if let Some(id) = &server_id {
            a.contains(&self.server_id_output, id, "/servers/");
        }

        if let Some(name) = &self.database_name_output {
            a.output(outputs, name);
        }
        let database_id = self
            .database_id_output
            .as_ref()
            .and_then(|name| a.output(outputs, name).map(|v| (name, v.to_string())));
        if let Some((name, id)) = &database_id {
            a.contains(name, id, "/databases/");
        }

        if let Some(name) = &self.private_endpoint_output {
            a.output_contains(outputs, name, "/privateEndpoints/");
        }
        let fqdn = self.fqdn_output.as_ref().and_then(|name| {
            let value = a.output(outputs, name)?;
            a.contains(name, value, ".database.windows.net");
            Some(value.to_string())
        });

        if !self.live {
            return;
        }
        if let Some(id) = server_id {
            if let Some(server) = ctx.live(a, ResourceKind::SqlServer, &id).await {
                a.equals(
                    "minimalTlsVersion",
                    &server.minimal_tls_version(),
                    &Some(self.min_tls_version.as_str()),
                );
                if let (Some(expected), Some(live)) = (&fqdn, server.fully_qualified_domain_name()) {
                    a.equals("fullyQualifiedDomainName", &live, &expected.as_str());
                }
                if self.require_private_access {
                    a.equals(
                        "publicNetworkAccess",
                        &server.public_network_access(),
                        &Some("Disabled"),
                    );
                }
            }
        }
        if let Some((_, id)) = database_id {
            ctx.live(a, ResourceKind::SqlDatabase, &id).await;
        }
    }
}

// =============================================================================
// Security and generic output checks
// =============================================================================

/// Every critical resource is reachable through a private endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateEndpointsCheck {
    pub outputs: Vec<String>,
}

impl Default for PrivateEndpointsCheck {
    fn default() -> Self {
        Self {
            outputs: vec![
                "storage_blob_private_endpoint_id".to_string(),
                "sql_private_endpoint_id".to_string(),
                "keyvault_private_endpoint_id".to_string(),
            ],
        }
    }
}

#[async_trait]
impl Validator for PrivateEndpointsCheck {
    fn name(&self) -> &str {
        "private_endpoints"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        for name in &self.outputs {
            a.output_contains(ctx.outputs, name, "/privateEndpoints/");
        }
    }
}

/// Application gateway (WAF front end) exists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationGatewayCheck {
    pub id_output: String,
    pub public_ip_output: Option<String>,
}

impl Default for ApplicationGatewayCheck {
    fn default() -> Self {
        Self {
            id_output: "application_gateway_id".to_string(),
            public_ip_output: None,
        }
    }
}

#[async_trait]
impl Validator for ApplicationGatewayCheck {
    fn name(&self) -> &str {
        "application_gateway"
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        a.output_contains(ctx.outputs, &self.id_output, "/applicationGateways/");
        if let Some(name) = &self.public_ip_output {
            a.output(ctx.outputs, name);
        }
    }
}

/// Expectation on a single output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputExpectation {
    pub name: String,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub starts_with: Option<String>,
}

/// Free-form output expectations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputsCheck {
    pub name: String,
    pub expect: Vec<OutputExpectation>,
}

impl Default for OutputsCheck {
    fn default() -> Self {
        Self {
            name: "outputs".to_string(),
            expect: Vec::new(),
        }
    }
}

#[async_trait]
impl Validator for OutputsCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, ctx: &ValidationContext<'_>, a: &mut Assertions) {
        for expectation in &self.expect {
            let values: Vec<String> = if expectation.list {
                a.output_list(ctx.outputs, &expectation.name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default()
            } else {
                a.output(ctx.outputs, &expectation.name)
                    .map(|v| vec![v.to_string()])
                    .unwrap_or_default()
            };

            for value in &values {
                if let Some(needle) = &expectation.contains {
                    a.contains(&expectation.name, value, needle);
                }
                if let Some(prefix) = &expectation.starts_with {
                    a.starts_with(&expectation.name, value, prefix);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tfprobe_common::OutputValue;

    fn scalar(v: &str) -> OutputValue {
        OutputValue::Scalar(v.to_string())
    }

    fn stack_outputs() -> Outputs {
        let rg = "/subscriptions/s/resourceGroups/rg-test";
        Outputs::from_values(BTreeMap::from([
            ("hub_vnet_id".into(), scalar(&format!("{rg}/providers/Microsoft.Network/virtualNetworks/vnet-test-hub"))),
            ("spoke_vnet_ids".into(), OutputValue::List(vec![format!("{rg}/providers/Microsoft.Network/virtualNetworks/vnet-test-spoke")])),
            ("appgw_subnet_id".into(), scalar(&format!("{rg}/providers/Microsoft.Network/virtualNetworks/vnet-test-hub/subnets/snet-appgw"))),
            ("aks_subnet_ids".into(), OutputValue::List(vec!["x/subnets/aks".into()])),
            ("private_dns_zone_keyvault_id".into(), scalar(&format!("{rg}/providers/Microsoft.Network/privateDnsZones/privatelink.vaultcore.azure.net"))),
            ("private_dns_zone_sql_id".into(), scalar(&format!("{rg}/providers/Microsoft.Network/privateDnsZones/privatelink.database.windows.net"))),
            ("storage_account_name".into(), scalar("sttestapp01")),
            ("storage_account_id".into(), scalar(&format!("{rg}/providers/Microsoft.Storage/storageAccounts/sttestapp01"))),
            ("storage_blob_private_endpoint_id".into(), scalar(&format!("{rg}/providers/Microsoft.Network/privateEndpoints/pe-st"))),
        ]))
    }

    async fn run(validator: &dyn Validator, outputs: &Outputs) -> crate::assertions::CheckOutcome {
        let ctx = ValidationContext::new(outputs, None);
        let mut a = Assertions::new(validator.name());
        validator.validate(&ctx, &mut a).await;
        a.finish()
    }

    #[tokio::test]
    async fn test_networking_passes_on_stack_outputs() {
        let outcome = run(&NetworkingCheck::default(), &stack_outputs()).await;
        assert!(outcome.passed, "{:?}", outcome.failures);
        assert!(outcome.skipped_live);
    }

    #[tokio::test]
    async fn test_networking_module_subset() {
        let check = NetworkingCheck {
            appgw_subnet_output: None,
            aks_subnets_output: None,
            keyvault_dns_zone_output: None,
            sql_dns_zone_output: None,
            live: false,
            ..Default::default()
        };
        let outputs = Outputs::from_values(BTreeMap::from([
            ("hub_vnet_id".into(), scalar("/a/virtualNetworks/hub")),
            ("spoke_vnet_ids".into(), OutputValue::List(vec!["/a/virtualNetworks/spoke".into()])),
        ]));
        let outcome = run(&check, &outputs).await;
        assert!(outcome.passed, "{:?}", outcome.failures);
        assert!(!outcome.skipped_live);
    }

    #[tokio::test]
    async fn test_storage_rejects_uppercase_name() {
        let mut values: BTreeMap<String, OutputValue> = BTreeMap::new();
        values.insert("storage_account_name".into(), scalar("StTestApp"));
        values.insert("storage_account_id".into(), scalar("/a/storageAccounts/StTestApp"));
        values.insert("storage_blob_private_endpoint_id".into(), scalar("/a/privateEndpoints/pe"));
        let outcome = run(&StorageCheck::default(), &Outputs::from_values(values)).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_outputs_fail_not_pass() {
        let outcome = run(&SqlCheck::default(), &Outputs::default()).await;
        assert!(!outcome.passed);
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.contains("Output not found")));
    }

    #[tokio::test]
    async fn test_outputs_check() {
        let check = OutputsCheck {
            name: "monitoring".into(),
            expect: vec![
                OutputExpectation {
                    name: "log_analytics_workspace_id".into(),
                    contains: Some("/workspaces/".into()),
                    ..Default::default()
                },
                OutputExpectation {
                    name: "spoke_vnet_ids".into(),
                    list: true,
                    contains: Some("/virtualNetworks/".into()),
                    ..Default::default()
                },
            ],
        };
        let outcome = run(&check, &stack_outputs()).await;
        assert_eq!(outcome.name, "monitoring");
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].contains("log_analytics_workspace_id"));
    }

    #[tokio::test]
    async fn test_aks_accepts_any_cluster_name() {
        let rg = "/subscriptions/s/resourceGroups/rg-test";
        let outputs = Outputs::from_values(BTreeMap::from([
            ("aks_cluster_name".into(), scalar("cluster-test-dev")),
            ("aks_cluster_id".into(), scalar(&format!("{rg}/providers/Microsoft.ContainerService/managedClusters/cluster-test-dev"))),
            ("aks_oidc_issuer_url".into(), scalar("https://eastus.oic.prod-aks.azure.com/t/i/")),
            ("agic_client_id".into(), scalar("11111111-2222-3333-4444-555555555555")),
        ]));
        let check = AksCheck {
            live: false,
            ..Default::default()
        };
        let outcome = run(&check, &outputs).await;
        assert!(outcome.passed, "{:?}", outcome.failures);

        let convention = AksCheck {
            live: false,
            name_contains: Some("aks".into()),
            ..Default::default()
        };
        let outcome = run(&convention, &outputs).await;
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_sensitive_output_expectation_is_masked() {
        let outputs = Outputs::from_json(
            r#"{"sql_admin_password": {"sensitive": true, "type": "string", "value": "SuperS3cret!"}}"#,
        )
        .unwrap();
        let check = OutputsCheck {
            name: "secrets".into(),
            expect: vec![OutputExpectation {
                name: "sql_admin_password".into(),
                contains: Some("zzz".into()),
                ..Default::default()
            }],
        };
        let outcome = run(&check, &outputs).await;
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.failures[0].contains("SuperS3cret!"));
        assert!(outcome.failures[0].contains("sql_admin_password should contain 'zzz'"));
    }

    #[test]
    fn test_check_spec_yaml() {
        let yaml = r#"
- check: networking
- check: aks
  live: false
- check: storage
  name_prefix: st
- check: key_vault
  uri_output: null
- check: outputs
  name: monitoring
  expect:
    - name: application_insights_id
      contains: /components/
"#;
        let specs: Vec<CheckSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(specs.len(), 5);
        match &specs[1] {
            CheckSpec::Aks(aks) => {
                assert!(!aks.live);
                assert!(aks.require_private_cluster);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &specs[3] {
            CheckSpec::KeyVault(kv) => assert!(kv.uri_output.is_none()),
            other => panic!("unexpected {other:?}"),
        }
        let names: Vec<String> = specs
            .into_iter()
            .map(|s| s.into_validator().name().to_string())
            .collect();
        assert_eq!(names, vec!["networking", "aks", "storage", "key_vault", "monitoring"]);
    }
}
