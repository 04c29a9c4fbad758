//! Typed views over live resource properties
//!
//! Property paths follow the ARM response bodies of each resource type.

use crate::types::RemoteResource;

impl RemoteResource {
    /// `apiServerAccessProfile.enablePrivateCluster` of a managed cluster
    pub fn private_cluster_enabled(&self) -> Option<bool> {
        self.bool_property("apiServerAccessProfile.enablePrivateCluster")
    }

    pub fn oidc_issuer_url(&self) -> Option<&str> {
        self.str_property("oidcIssuerProfile.issuerURL")
    }

    pub fn provisioning_state(&self) -> Option<&str> {
        self.str_property("provisioningState")
    }

    /// `minimumTlsVersion` of a storage account, e.g. `TLS1_2`
    pub fn minimum_tls_version(&self) -> Option<&str> {
        self.str_property("minimumTlsVersion")
    }

    pub fn blob_public_access_allowed(&self) -> Option<bool> {
        self.bool_property("allowBlobPublicAccess")
    }

    pub fn https_only(&self) -> Option<bool> {
        self.bool_property("supportsHttpsTrafficOnly")
    }

    pub fn blob_encryption_enabled(&self) -> Option<bool> {
        self.bool_property("encryption.services.blob.enabled")
    }

    /// `publicNetworkAccess`, shared by storage, key vault and SQL server
    pub fn public_network_access(&self) -> Option<&str> {
        self.str_property("publicNetworkAccess")
    }

    pub fn soft_delete_enabled(&self) -> Option<bool> {
        self.bool_property("enableSoftDelete")
    }

    pub fn purge_protection_enabled(&self) -> Option<bool> {
        self.bool_property("enablePurgeProtection")
    }

    /// `minimalTlsVersion` of a SQL server, e.g. `1.2`
    pub fn minimal_tls_version(&self) -> Option<&str> {
        self.str_property("minimalTlsVersion")
    }

    pub fn fully_qualified_domain_name(&self) -> Option<&str> {
        self.str_property("fullyQualifiedDomainName")
    }

    pub fn address_prefixes(&self) -> Vec<String> {
        self.property("addressSpace.addressPrefixes")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subnet_names(&self) -> Vec<String> {
        self.property("subnets")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
