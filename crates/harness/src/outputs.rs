//! Reading published outputs after an apply

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use tfprobe_common::OutputValue;

use crate::error::{HarnessError, HarnessResult};
use crate::options::RunOptions;
use crate::terraform::Terraform;

/// One entry of `terraform output -json`
#[derive(Debug, Deserialize)]
struct RawOutput {
    value: serde_json::Value,
    #[serde(default)]
    sensitive: bool,
}

/// Every output published by a run, keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outputs {
    values: BTreeMap<String, OutputValue>,
    sensitive: Vec<String>,
}

impl Outputs {
    /// Parse the document printed by `terraform output -json`
    pub fn from_json(document: &str) -> HarnessResult<Self> {
        let trimmed = document.trim();
        // Older terraform prints nothing at all when there are no outputs.
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let raw: HashMap<String, RawOutput> = serde_json::from_str(trimmed)?;
        let mut sensitive: Vec<String> = raw
            .iter()
            .filter(|(_, o)| o.sensitive)
            .map(|(name, _)| name.clone())
            .collect();
        sensitive.sort();

        let values = raw
            .into_iter()
            .map(|(name, output)| (name, OutputValue::from_json(&output.value)))
            .collect();
        Ok(Self { values, sensitive })
    }

    pub fn from_values(values: BTreeMap<String, OutputValue>) -> Self {
        Self {
            values,
            sensitive: Vec::new(),
        }
    }

    /// A scalar output
    pub fn get(&self, name: &str) -> HarnessResult<&str> {
        match self.values.get(name) {
            Some(OutputValue::Scalar(s)) => Ok(s.as_str()),
            Some(other) => Err(HarnessError::OutputType {
                name: name.to_string(),
                expected: "scalar",
                actual: other.kind(),
            }),
            None => Err(HarnessError::OutputNotFound(name.to_string())),
        }
    }

    /// A list output
    pub fn list(&self, name: &str) -> HarnessResult<&[String]> {
        match self.values.get(name) {
            Some(OutputValue::List(items)) => Ok(items.as_slice()),
            Some(other) => Err(HarnessError::OutputType {
                name: name.to_string(),
                expected: "list",
                actual: other.kind(),
            }),
            None => Err(HarnessError::OutputNotFound(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.sensitive.iter().any(|s| s == name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Terraform {
    /// All outputs of the last apply (`terraform output -json`), read once without retries
    pub fn output_all(&self, opts: &RunOptions) -> HarnessResult<Outputs> {
        let mut args = vec!["output".to_string()];
        if opts.no_color() {
            args.push("-no-color".to_string());
        }
        args.push("-json".to_string());
        let output = self.run_once(opts, args, &[0])?;
        Outputs::from_json(&output.stdout)
    }

    /// A single scalar output; an unpublished name is `OutputNotFound`
    pub fn output(&self, opts: &RunOptions, name: &str) -> HarnessResult<String> {
        self.output_all(opts)?.get(name).map(str::to_string)
    }

    /// A single list output; an unpublished name is `OutputNotFound`
    pub fn output_list(&self, opts: &RunOptions, name: &str) -> HarnessResult<Vec<String>> {
        self.output_all(opts)?.list(name).map(<[String]>::to_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "hub_vnet_id": {
            "sensitive": false,
            "type": "string",
            "value": "/subscriptions/s/resourceGroups/rg-test/providers/Microsoft.Network/virtualNetworks/vnet-test-hub"
        },
        "spoke_vnet_ids": {
            "sensitive": false,
            "type": ["list", "string"],
            "value": ["/a/virtualNetworks/one", "/a/virtualNetworks/two"]
        },
        "aks_node_count": {"sensitive": false, "type": "number", "value": 2},
        "sql_admin_password": {"sensitive": true, "type": "string", "value": "x"}
    }"#;

    #[test]
    fn test_parse_outputs() {
        let outputs = Outputs::from_json(DOCUMENT).unwrap();
        assert_eq!(outputs.len(), 4);
        assert!(outputs.get("hub_vnet_id").unwrap().contains("/virtualNetworks/"));
        assert_eq!(outputs.list("spoke_vnet_ids").unwrap().len(), 2);
        assert_eq!(outputs.get("aks_node_count").unwrap(), "2");
        assert!(outputs.is_sensitive("sql_admin_password"));
        assert!(!outputs.is_sensitive("hub_vnet_id"));
    }

    #[test]
    fn test_missing_output_is_not_found() {
        let outputs = Outputs::from_json(DOCUMENT).unwrap();
        let err = outputs.get("keyvault_uri").unwrap_err();
        assert!(matches!(err, HarnessError::OutputNotFound(ref n) if n == "keyvault_uri"));
        assert!(err.is_not_found());
        assert!(outputs.list("aks_subnet_ids").unwrap_err().is_not_found());
    }

    #[test]
    fn test_type_mismatch() {
        let outputs = Outputs::from_json(DOCUMENT).unwrap();
        assert!(matches!(
            outputs.get("spoke_vnet_ids"),
            Err(HarnessError::OutputType { expected: "scalar", actual: "list", .. })
        ));
        assert!(matches!(
            outputs.list("hub_vnet_id"),
            Err(HarnessError::OutputType { expected: "list", .. })
        ));
    }

    #[test]
    fn test_empty_document() {
        assert!(Outputs::from_json("").unwrap().is_empty());
        assert!(Outputs::from_json("{}").unwrap().is_empty());
    }
}
