//! Process identity attached to every exported batch.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::telemetry::span::AttributeValue;

pub const SERVICE_NAME: &str = "service.name";
pub const SERVICE_VERSION: &str = "service.version";

/// Immutable set of resource attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Resource {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Resource {
    pub fn new<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        Self {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Attributes describing the SDK, the runtime and the host.
    pub fn default_attributes() -> Self {
        let mut resource = Self::new([
            ("telemetry.sdk.name", AttributeValue::from(env!("CARGO_PKG_NAME"))),
            ("telemetry.sdk.language", AttributeValue::from("rust")),
            ("telemetry.sdk.version", AttributeValue::from(env!("CARGO_PKG_VERSION"))),
            ("process.pid", AttributeValue::from(std::process::id())),
            ("process.runtime.name", AttributeValue::from("rustc")),
            ("os.type", AttributeValue::from(std::env::consts::OS)),
            ("host.arch", AttributeValue::from(std::env::consts::ARCH)),
        ]);
        if let Some(host) = sysinfo::System::host_name() {
            resource.attributes.insert("host.name".to_string(), host.into());
        }
        resource
    }

    /// Default attributes merged with the service identity.
    pub fn for_service(name: &str, version: &str) -> Self {
        Self::default_attributes().merge(&Self::new([
            (SERVICE_NAME, name),
            (SERVICE_VERSION, version),
        ]))
    }

    /// Combine two resources. Keys present in `other` win.
    pub fn merge(&self, other: &Resource) -> Resource {
        let mut attributes = self.attributes.clone();
        attributes.extend(other.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Resource { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_service_attributes() {
        let base = Resource::new([(SERVICE_NAME, "unknown_service"), ("os.type", "linux")]);
        let service = Resource::new([(SERVICE_NAME, "telemetry-app")]);

        let merged = base.merge(&service);
        assert_eq!(merged.get(SERVICE_NAME), Some(&AttributeValue::from("telemetry-app")));
        assert_eq!(merged.get("os.type"), Some(&AttributeValue::from("linux")));
        // inputs untouched
        assert_eq!(base.get(SERVICE_NAME), Some(&AttributeValue::from("unknown_service")));
    }

    #[test]
    fn test_for_service_includes_defaults() {
        let resource = Resource::for_service("svc", "1.2.3");
        assert_eq!(resource.get(SERVICE_VERSION), Some(&AttributeValue::from("1.2.3")));
        assert_eq!(resource.get("telemetry.sdk.language"), Some(&AttributeValue::from("rust")));
        assert!(resource.get("process.pid").is_some());
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let resource = Resource::new([(SERVICE_NAME, "svc")]);
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json, serde_json::json!({ "service.name": "svc" }));
    }
}
