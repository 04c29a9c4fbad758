//! Live resource lookups against Azure Resource Manager
//!
//! ```text
//! CloudInspector (trait)
//!   ├── virtual_network(rg, name)
//!   ├── managed_cluster(rg, name)
//!   ├── storage_account(rg, name)
//!   ├── key_vault(rg, name)
//!   ├── sql_server(rg, name)
//!   └── sql_database(rg, server, name)
//!
//! ArmClient: client-credentials token -> GET {management}/subscriptions/...?api-version=
//! ```
//!
//! Snapshots are never cached; every call is a fresh GET.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use tfprobe_common::{Credentials, RemoteResource, ResourceKind};

use crate::error::{HarnessError, HarnessResult};

/// Refresh tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(120);

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub resource_group: String,
    pub name: String,
    /// Parent resource name for child resources (the server of a SQL database)
    pub parent: Option<String>,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind, resource_group: &str, name: &str) -> Self {
        Self {
            kind,
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            parent: None,
        }
    }
}

/// Source of live resource snapshots
#[async_trait]
pub trait CloudInspector: Send + Sync {
    async fn get_resource(&self, request: &ResourceRequest) -> HarnessResult<RemoteResource>;

    async fn virtual_network(&self, resource_group: &str, name: &str) -> HarnessResult<RemoteResource> {
        self.get_resource(&ResourceRequest::new(ResourceKind::VirtualNetwork, resource_group, name))
            .await
    }

    async fn managed_cluster(&self, resource_group: &str, name: &str) -> HarnessResult<RemoteResource> {
        self.get_resource(&ResourceRequest::new(ResourceKind::ManagedCluster, resource_group, name))
            .await
    }

    async fn storage_account(&self, resource_group: &str, name: &str) -> HarnessResult<RemoteResource> {
        self.get_resource(&ResourceRequest::new(ResourceKind::StorageAccount, resource_group, name))
            .await
    }

    async fn key_vault(&self, resource_group: &str, name: &str) -> HarnessResult<RemoteResource> {
        self.get_resource(&ResourceRequest::new(ResourceKind::KeyVault, resource_group, name))
            .await
    }

    async fn sql_server(&self, resource_group: &str, name: &str) -> HarnessResult<RemoteResource> {
        self.get_resource(&ResourceRequest::new(ResourceKind::SqlServer, resource_group, name))
            .await
    }

    async fn sql_database(
        &self,
        resource_group: &str,
        server: &str,
        name: &str,
    ) -> HarnessResult<RemoteResource> {
        let mut request = ResourceRequest::new(ResourceKind::SqlDatabase, resource_group, name);
        request.parent = Some(server.to_string());
        self.get_resource(&request).await
    }
}

/// Endpoints and API versions for the ARM client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub management_url: String,
    pub login_url: String,
    pub request_timeout_secs: u64,
    pub api_versions: ApiVersions,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            management_url: "https://management.azure.com".to_string(),
            login_url: "https://login.microsoftonline.com".to_string(),
            request_timeout_secs: 60,
            api_versions: ApiVersions::default(),
        }
    }
}

/// `api-version` query values per resource provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersions {
    pub network: String,
    pub container_service: String,
    pub storage: String,
    pub key_vault: String,
    pub sql: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            network: "2023-09-01".to_string(),
            container_service: "2024-02-01".to_string(),
            storage: "2023-01-01".to_string(),
            key_vault: "2023-07-01".to_string(),
            sql: "2021-11-01".to_string(),
        }
    }
}

impl ApiVersions {
    pub fn for_kind(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::VirtualNetwork => &self.network,
            ResourceKind::ManagedCluster => &self.container_service,
            ResourceKind::StorageAccount => &self.storage,
            ResourceKind::KeyVault => &self.key_vault,
            ResourceKind::SqlServer | ResourceKind::SqlDatabase => &self.sql,
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// [`CloudInspector`] backed by the ARM REST API
pub struct ArmClient {
    http: reqwest::Client,
    credentials: Credentials,
    config: ArmConfig,
    token: Mutex<Option<CachedToken>>,
}

impl ArmClient {
    pub fn new(credentials: Credentials, config: ArmConfig) -> HarnessResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            credentials,
            config,
            token: Mutex::new(None),
        })
    }

    /// URL of the resource described by `request`
    pub fn resource_url(&self, request: &ResourceRequest) -> String {
        let base = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.config.management_url.trim_end_matches('/'),
            self.credentials.subscription_id,
            request.resource_group,
            request.kind.provider_path(),
        );
        let path = match (&request.kind, &request.parent) {
            (ResourceKind::SqlDatabase, Some(server)) => {
                format!("{}/{}/databases/{}", base, server, request.name)
            }
            _ => format!("{}/{}", base, request.name),
        };
        format!(
            "{}?api-version={}",
            path,
            self.config.api_versions.for_kind(request.kind)
        )
    }

    async fn access_token(&self) -> HarnessResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.login_url.trim_end_matches('/'),
            self.credentials.tenant_id
        );
        let scope = format!("{}/.default", self.config.management_url.trim_end_matches('/'));
        debug!("Requesting ARM token for client {}", self.credentials.client_id);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(HarnessError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let (value, expires_in) = parse_token_response(&body)?;
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });
        Ok(value)
    }
}

#[async_trait]
impl CloudInspector for ArmClient {
    async fn get_resource(&self, request: &ResourceRequest) -> HarnessResult<RemoteResource> {
        let token = self.access_token().await?;
        let url = self.resource_url(request);
        debug!("GET {}", url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, request, body));
        }
        let json: serde_json::Value = serde_json::from_str(&body)?;
        Ok(RemoteResource::from_arm(request.kind, &json))
    }
}

/// Map a non-success ARM status to the harness error taxonomy
pub fn classify_failure(status: u16, request: &ResourceRequest, body: String) -> HarnessError {
    match status {
        404 => HarnessError::NotFound {
            kind: request.kind,
            name: request.name.clone(),
        },
        401 | 403 => HarnessError::Unauthorized {
            kind: request.kind,
            name: request.name.clone(),
            message: arm_error_message(&body).unwrap_or(body),
        },
        _ => HarnessError::ArmStatus { status, body },
    }
}

fn arm_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = json.get("error")?;
    let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("Error");
    let message = error.get("message").and_then(|m| m.as_str()).unwrap_or_default();
    Some(format!("{}: {}", code, message))
}

/// `(access_token, expires_in_secs)`; `expires_in` may be a number or a string
fn parse_token_response(body: &str) -> HarnessResult<(String, u64)> {
    let json: serde_json::Value = serde_json::from_str(body)?;
    let token = json
        .get("access_token")
        .and_then(|t| t.as_str())
        .ok_or_else(|| HarnessError::Auth("token response has no access_token".to_string()))?;
    let expires_in = match json.get("expires_in") {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };
    Ok((token.to_string(), expires_in))
}
