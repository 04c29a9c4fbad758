//! Declarative YAML scenario definitions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tfprobe_common::DeploymentVariables;

use crate::error::{HarnessError, HarnessResult};
use crate::options::RetryPolicy;
use crate::terraform::PLAN_NO_CHANGES;
use crate::validators::{CheckSpec, Validator};

/// What a scenario does with its configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    /// init, apply, validate, destroy
    #[default]
    Deploy,
    /// init, validate, plan; nothing is provisioned
    Plan,
}

/// Per-scenario retry overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryOverrides {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<u64>,
}

impl RetryOverrides {
    pub fn apply(&self, mut policy: RetryPolicy) -> RetryPolicy {
        if let Some(max) = self.max_retries {
            policy = policy.with_max_retries(max);
        }
        if let Some(secs) = self.delay_secs {
            policy = policy.with_delay(std::time::Duration::from_secs(secs));
        }
        policy
    }
}

/// A complete scenario definition parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Configuration directory; relative paths resolve against the spec file
    pub terraform_dir: PathBuf,

    #[serde(default)]
    pub mode: ScenarioMode,

    #[serde(default)]
    pub variables: DeploymentVariables,

    /// Inject a fresh `random_suffix` on every run
    #[serde(default)]
    pub unique_suffix: bool,

    /// Initialize the configured backend; `false` runs `init -backend=false`
    #[serde(default = "default_backend")]
    pub backend: bool,

    /// Plan mode: the `-detailed-exitcode` the plan must return
    #[serde(default = "default_plan_exit_code")]
    pub expected_plan_exit_code: i32,

    #[serde(default)]
    pub retry: RetryOverrides,

    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

fn default_backend() -> bool {
    true
}

fn default_plan_exit_code() -> i32 {
    PLAN_NO_CHANGES
}

impl ScenarioSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.check()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| HarnessError::SpecParse(format!("{}: {}", path.display(), e)))?;
        if spec.terraform_dir.is_relative() {
            if let Some(parent) = path.parent() {
                spec.terraform_dir = parent.join(&spec.terraform_dir);
            }
        }
        Ok(spec)
    }

    /// Load all scenarios from a directory, sorted by path
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    /// Load a single file or every scenario under a directory
    pub fn load(path: &Path) -> HarnessResult<Vec<Self>> {
        if path.is_dir() {
            Self::load_all(path)
        } else {
            Ok(vec![Self::from_file(path)?])
        }
    }

    /// Filter specs by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    fn check(&self) -> HarnessResult<()> {
        if self.name.trim().is_empty() {
            return Err(HarnessError::SpecParse("scenario name must not be empty".into()));
        }
        if self.mode == ScenarioMode::Plan && !self.checks.is_empty() {
            return Err(HarnessError::SpecParse(format!(
                "{}: plan scenarios cannot have checks, nothing is deployed",
                self.name
            )));
        }
        self.variables.validate()?;
        Ok(())
    }
}

/// A runnable scenario: the spec plus its validators
#[derive(Clone)]
pub struct Scenario {
    pub spec: ScenarioSpec,
    pub validators: Vec<Arc<dyn Validator>>,
}

impl Scenario {
    pub fn from_spec(spec: ScenarioSpec) -> Self {
        let validators = spec
            .checks
            .iter()
            .cloned()
            .map(CheckSpec::into_validator)
            .collect();
        Self { spec, validators }
    }

    /// Add a validator not expressible in YAML
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.spec.name)
            .field(
                "validators",
                &self.validators.iter().map(|v| v.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FULL_STACK: &str = r#"
name: dev-environment
description: Full hub-spoke stack
tags: [full, slow]
terraform_dir: ../environments/dev
unique_suffix: true
variables:
  prefix: test
  environment: dev
  location: eastus
  location_short: eus
  project_name: testapp
  aks_node_count: 2
  kubernetes_version: "1.28"
  sql_administrator_login: sqladmin
  sql_administrator_password: TestP@ssw0rd123!
  sql_database_name: testdb
retry:
  max_retries: 5
checks:
  - check: networking
  - check: aks
  - check: storage
  - check: key_vault
  - check: sql
  - check: private_endpoints
"#;

    #[test]
    fn test_parse_full_stack() {
        let spec = ScenarioSpec::from_yaml(FULL_STACK).unwrap();
        assert_eq!(spec.name, "dev-environment");
        assert_eq!(spec.mode, ScenarioMode::Deploy);
        assert!(spec.unique_suffix);
        assert!(spec.backend);
        assert_eq!(spec.variables.aks_node_count, Some(2));
        assert_eq!(spec.checks.len(), 6);
        assert_eq!(spec.retry.max_retries, Some(5));

        let scenario = Scenario::from_spec(spec);
        assert_eq!(scenario.validators.len(), 6);
        assert_eq!(scenario.validators[3].name(), "key_vault");
    }

    #[test]
    fn test_parse_plan_scenario() {
        let yaml = r#"
name: security-compliance
terraform_dir: /tmp/environments/dev
mode: plan
backend: false
variables:
  prefix: sec
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.mode, ScenarioMode::Plan);
        assert!(!spec.backend);
        assert_eq!(spec.expected_plan_exit_code, 0);
    }

    #[test]
    fn test_parse_aks_module_scenario() {
        let yaml = r#"
name: aks-module
tags: [module]
terraform_dir: ../modules/aks
variables:
  environment: test
  location: eastus
  location_short: eus
  resource_group_name: rg-aks-test-eus
  kubernetes_version: "1.28.3"
  ssh_public_key: ssh-rsa AAAAB3NzaC1yc2E test@tfprobe
  admin_group_object_ids: ["00000000-0000-0000-0000-000000000001"]
  resource_refs:
    subnet_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/aks
    vnet_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet
    application_gateway_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/applicationGateways/agw
checks:
  - check: aks
    agic_client_id_output: null
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        let names: Vec<String> = spec
            .variables
            .to_pairs()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert!(names.contains(&"ssh_public_key".to_string()));
        assert!(names.contains(&"admin_group_object_ids".to_string()));
        assert!(names.contains(&"application_gateway_id".to_string()));
        assert_eq!(spec.checks.len(), 1);
    }

    #[test]
    fn test_parse_key_vault_module_scenario() {
        let yaml = r#"
name: keyvault-module
tags: [module]
terraform_dir: ../modules/keyvault
variables:
  environment: test
  project_name: testapp
  location: eastus
  location_short: eus
  resource_group_name: rg-keyvault-test-eus
  aks_kubelet_identity_object_id: 00000000-0000-0000-0000-000000000002
  resource_refs:
    private_endpoint_subnet_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/pe
    private_dns_zone_keyvault_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/privateDnsZones/privatelink.vaultcore.azure.net
    log_analytics_workspace_id: /subscriptions/s/resourceGroups/rg/providers/Microsoft.OperationalInsights/workspaces/law
checks:
  - check: key_vault
"#;
        let spec = ScenarioSpec::from_yaml(yaml).unwrap();
        assert_eq!(
            spec.variables.aks_kubelet_identity_object_id.as_deref(),
            Some("00000000-0000-0000-0000-000000000002")
        );
        assert_eq!(spec.variables.resource_refs.len(), 3);
    }

    #[test]
    fn test_rejects_unknown_variable() {
        let yaml = r#"
name: bad
terraform_dir: x
variables:
  not_a_variable: 1
"#;
        assert!(ScenarioSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_invalid_prefix() {
        let yaml = r#"
name: bad
terraform_dir: x
variables:
  prefix: Not_Valid
"#;
        assert!(ScenarioSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_plan_with_checks_rejected() {
        let yaml = r#"
name: bad
terraform_dir: x
mode: plan
checks:
  - check: aks
"#;
        assert!(matches!(
            ScenarioSpec::from_yaml(yaml),
            Err(HarnessError::SpecParse(_))
        ));
    }

    #[test]
    fn test_load_all_resolves_relative_dirs() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("modules");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("a.yaml"), FULL_STACK).unwrap();
        std::fs::write(
            nested.join("storage.yml"),
            "name: storage-module\ntags: [module]\nterraform_dir: ../../modules/storage\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a spec").unwrap();

        let specs = ScenarioSpec::load(dir.path()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].terraform_dir, dir.path().join("../environments/dev"));
        assert_eq!(specs[1].terraform_dir, nested.join("../../modules/storage"));

        assert_eq!(ScenarioSpec::filter_by_tag(&specs, "module").len(), 1);
        assert_eq!(ScenarioSpec::load(&dir.path().join("a.yaml")).unwrap().len(), 1);
    }

    #[test]
    fn test_retry_overrides() {
        let overrides = RetryOverrides {
            max_retries: Some(0),
            delay_secs: None,
        };
        let policy = overrides.apply(RetryPolicy::transient_defaults());
        assert_eq!(policy.max_retries(), 0);
        assert_eq!(policy.delay(), crate::options::DEFAULT_RETRY_DELAY);
    }
}
