//! Azure Resource Manager resource identifiers
//!
//! Terraform outputs publish ARM ids such as
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Sql/servers/{server}/databases/{db}`.
//! Live verification needs the resource group and names back out of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed ARM resource id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider_namespace: String,
    /// `(type, name)` pairs from the outermost resource to the innermost child
    pub segments: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = id.trim();
        if !trimmed.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let parts: Vec<&str> = trimmed
            .trim_start_matches('/')
            .trim_end_matches('/')
            .split('/')
            .collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("contains an empty segment"));
        }
        if parts.len() < 4 {
            return Err(invalid("too few segments"));
        }
        if !parts[0].eq_ignore_ascii_case("subscriptions") {
            return Err(invalid("expected 'subscriptions' as first segment"));
        }
        if !parts[2].eq_ignore_ascii_case("resourceGroups") {
            return Err(invalid("expected 'resourceGroups' as third segment"));
        }

        let subscription_id = parts[1].to_string();
        let resource_group = parts[3].to_string();

        // A bare resource group id has no provider section.
        if parts.len() == 4 {
            return Ok(Self {
                subscription_id,
                resource_group,
                provider_namespace: String::new(),
                segments: Vec::new(),
            });
        }

        if parts.len() < 8 || !parts[4].eq_ignore_ascii_case("providers") {
            return Err(invalid("expected 'providers/{namespace}/{type}/{name}'"));
        }

        let provider_namespace = parts[5].to_string();
        let rest = &parts[6..];
        if rest.len() % 2 != 0 {
            return Err(invalid("resource type without a name"));
        }
        let segments = rest
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        Ok(Self {
            subscription_id,
            resource_group,
            provider_namespace,
            segments,
        })
    }

    /// Name of the innermost resource, or the resource group for a group id
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|(_, name)| name.as_str())
            .unwrap_or(&self.resource_group)
    }

    /// Name of the parent resource for child resources (e.g. the SQL server of a database)
    pub fn parent_name(&self) -> Option<&str> {
        let len = self.segments.len();
        if len < 2 {
            return None;
        }
        Some(self.segments[len - 2].1.as_str())
    }

    /// Fully qualified type, e.g. `Microsoft.Network/virtualNetworks/subnets`
    pub fn resource_type(&self) -> String {
        let mut out = self.provider_namespace.clone();
        for (kind, _) in &self.segments {
            out.push('/');
            out.push_str(kind);
        }
        out
    }

    /// Whether the innermost segment is of the given type (case-insensitive)
    pub fn is_kind(&self, kind: &str) -> bool {
        self.segments
            .last()
            .map(|(k, _)| k.eq_ignore_ascii_case(kind))
            .unwrap_or(false)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if !self.provider_namespace.is_empty() {
            write!(f, "/providers/{}", self.provider_namespace)?;
        }
        for (kind, name) in &self.segments {
            write!(f, "/{}/{}", kind, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VNET: &str = "/subscriptions/0000-1111/resourceGroups/rg-test-net/providers/Microsoft.Network/virtualNetworks/vnet-hub-test";

    #[test]
    fn test_parse_vnet_id() {
        let id = ResourceId::parse(VNET).unwrap();
        assert_eq!(id.subscription_id, "0000-1111");
        assert_eq!(id.resource_group, "rg-test-net");
        assert_eq!(id.name(), "vnet-hub-test");
        assert_eq!(id.resource_type(), "Microsoft.Network/virtualNetworks");
        assert!(id.is_kind("virtualnetworks"));
        assert_eq!(id.parent_name(), None);
    }

    #[test]
    fn test_parse_child_resource() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/sql-test/databases/testdb",
        )
        .unwrap();
        assert_eq!(id.name(), "testdb");
        assert_eq!(id.parent_name(), Some("sql-test"));
        assert_eq!(id.resource_type(), "Microsoft.Sql/servers/databases");
    }

    #[test]
    fn test_lowercase_resource_groups_segment() {
        let id = ResourceId::parse(
            "/subscriptions/s/resourcegroups/rg/providers/Microsoft.KeyVault/vaults/kv-test",
        )
        .unwrap();
        assert_eq!(id.resource_group, "rg");
        assert_eq!(id.name(), "kv-test");
    }

    #[test]
    fn test_resource_group_id() {
        let id = ResourceId::parse("/subscriptions/s/resourceGroups/rg-only").unwrap();
        assert_eq!(id.name(), "rg-only");
        assert!(id.segments.is_empty());
    }

    #[test]
    fn test_display_roundtrip() {
        let id = ResourceId::parse(VNET).unwrap();
        assert_eq!(id.to_string(), VNET);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(ResourceId::parse("").is_err());
        assert!(ResourceId::parse("subscriptions/s/resourceGroups/rg").is_err());
        assert!(ResourceId::parse("/subscriptions/.../subnets/test").is_err());
        assert!(ResourceId::parse("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks").is_err());
    }
}
