//! Test doubles for the harness integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use tfprobe_common::{RemoteResource, ResourceKind};
use tfprobe_harness::{
    CloudInspector, CommandExecutor, CommandOutput, CommandSpec, HarnessError, HarnessResult,
    ResourceRequest,
};

pub const RG: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-test-dev-eus";

/// `terraform output -json` document of a healthy full-stack deployment
pub fn stack_outputs_json() -> String {
    let network = format!("{RG}/providers/Microsoft.Network");
    serde_json::json!({
        "hub_vnet_id": {"sensitive": false, "type": "string", "value": format!("{network}/virtualNetworks/vnet-test-hub")},
        "spoke_vnet_ids": {"sensitive": false, "type": ["list", "string"], "value": [format!("{network}/virtualNetworks/vnet-test-spoke")]},
        "appgw_subnet_id": {"sensitive": false, "type": "string", "value": format!("{network}/virtualNetworks/vnet-test-hub/subnets/snet-appgw")},
        "aks_subnet_ids": {"sensitive": false, "type": ["list", "string"], "value": [format!("{network}/virtualNetworks/vnet-test-spoke/subnets/snet-aks")]},
        "private_dns_zone_keyvault_id": {"sensitive": false, "type": "string", "value": format!("{network}/privateDnsZones/privatelink.vaultcore.azure.net")},
        "private_dns_zone_sql_id": {"sensitive": false, "type": "string", "value": format!("{network}/privateDnsZones/privatelink.database.windows.net")},
        "aks_cluster_name": {"sensitive": false, "type": "string", "value": "aks-test-dev-eus"},
        "aks_cluster_id": {"sensitive": false, "type": "string", "value": format!("{RG}/providers/Microsoft.ContainerService/managedClusters/aks-test-dev-eus")},
        "aks_oidc_issuer_url": {"sensitive": false, "type": "string", "value": "https://eastus.oic.prod-aks.azure.com/tenant/issuer/"},
        "agic_client_id": {"sensitive": false, "type": "string", "value": "11111111-2222-3333-4444-555555555555"},
        "storage_account_name": {"sensitive": false, "type": "string", "value": "sttestdeveus01"},
        "storage_account_id": {"sensitive": false, "type": "string", "value": format!("{RG}/providers/Microsoft.Storage/storageAccounts/sttestdeveus01")},
        "storage_blob_private_endpoint_id": {"sensitive": false, "type": "string", "value": format!("{network}/privateEndpoints/pe-st-blob")},
        "keyvault_name": {"sensitive": false, "type": "string", "value": "kv-test-dev-eus"},
        "keyvault_id": {"sensitive": false, "type": "string", "value": format!("{RG}/providers/Microsoft.KeyVault/vaults/kv-test-dev-eus")},
        "keyvault_uri": {"sensitive": false, "type": "string", "value": "https://kv-test-dev-eus.vault.azure.net/"},
        "keyvault_private_endpoint_id": {"sensitive": false, "type": "string", "value": format!("{network}/privateEndpoints/pe-kv")},
        "sql_server_name": {"sensitive": false, "type": "string", "value": "sql-test-dev-eus"},
        "sql_server_id": {"sensitive": false, "type": "string", "value": format!("{RG}/providers/Microsoft.Sql/servers/sql-test-dev-eus")},
        "sql_database_name": {"sensitive": false, "type": "string", "value": "sqldb-test"},
        "sql_database_id": {"sensitive": false, "type": "string", "value": format!("{RG}/providers/Microsoft.Sql/servers/sql-test-dev-eus/databases/sqldb-test")},
        "sql_private_endpoint_id": {"sensitive": false, "type": "string", "value": format!("{network}/privateEndpoints/pe-sql")},
        "sql_server_fqdn": {"sensitive": false, "type": "string", "value": "sql-test-dev-eus.database.windows.net"},
        "sql_admin_password": {"sensitive": true, "type": "string", "value": "TestP@ssw0rd123!"},
    })
    .to_string()
}

/// Executor answering terraform commands from a script.
///
/// Responses queued for a subcommand are consumed in order; once a queue is
/// empty the subcommand succeeds. `output` answers with the configured document.
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    outputs_json: Mutex<String>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            outputs_json: Mutex::new("{}".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_outputs(self, document: impl Into<String>) -> Self {
        *self.outputs_json.lock() = document.into();
        self
    }

    /// Queue a failing response for `subcommand`
    pub fn fail(self, subcommand: &str, exit_code: i32, stderr: &str) -> Self {
        self.push(
            subcommand,
            CommandOutput {
                exit_code,
                stderr: stderr.to_string(),
                ..Default::default()
            },
        );
        self
    }

    pub fn push(&self, subcommand: &str, output: CommandOutput) {
        self.responses
            .lock()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(output);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Subcommands in call order
    pub fn subcommands(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| c.subcommand().to_string())
            .collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.subcommand() == subcommand)
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        self.calls.lock().push(spec.clone());

        if let Some(output) = self
            .responses
            .lock()
            .get_mut(spec.subcommand())
            .and_then(|q| q.pop_front())
        {
            return Ok(output);
        }

        let stdout = if spec.subcommand() == "output" {
            self.outputs_json.lock().clone()
        } else {
            String::new()
        };
        Ok(CommandOutput {
            exit_code: 0,
            stdout,
            ..Default::default()
        })
    }
}

/// In-memory [`CloudInspector`]
#[derive(Default)]
pub struct FakeInspector {
    resources: HashMap<(ResourceKind, String), RemoteResource>,
    requests: Mutex<Vec<ResourceRequest>>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ResourceKind, name: &str, properties: serde_json::Value) -> Self {
        self.resources.insert(
            (kind, name.to_string()),
            RemoteResource {
                kind,
                id: format!("{RG}/providers/{}/{}", kind.provider_path(), name),
                name: name.to_string(),
                location: "eastus".to_string(),
                tags: Default::default(),
                properties,
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<ResourceRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CloudInspector for FakeInspector {
    async fn get_resource(&self, request: &ResourceRequest) -> HarnessResult<RemoteResource> {
        self.requests.lock().push(request.clone());
        self.resources
            .get(&(request.kind, request.name.clone()))
            .cloned()
            .ok_or_else(|| HarnessError::NotFound {
                kind: request.kind,
                name: request.name.clone(),
            })
    }
}

/// Scratch terraform directory path; the scripted executor never touches it
pub fn terraform_dir() -> PathBuf {
    std::env::temp_dir().join("tfprobe-scripted")
}
