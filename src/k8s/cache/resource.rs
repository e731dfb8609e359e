/**
 * Identities used to key the cache
 *
 * A resource type is the (apiVersion, kind) pair and an object is addressed
 * within its type by (namespace, name). The `/` separator only appears when
 * a key is rendered or parsed.
 */
use kube::api::DynamicObject;
use kube::ResourceExt;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Separator used when rendering identities as strings
pub const KEY_SEPARATOR: char = '/';

/// A class of cluster-state objects, e.g. `apps/v1` + `Deployment`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceType {
    api_version: Arc<str>,
    kind: Arc<str>,
}

impl ResourceType {
    #[must_use]
    pub fn new(api_version: impl AsRef<str>, kind: impl AsRef<str>) -> Self {
        Self {
            api_version: Arc::from(api_version.as_ref()),
            kind: Arc::from(kind.as_ref()),
        }
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// API group, empty for the core group (`v1`)
    #[must_use]
    pub fn group(&self) -> &str {
        self.api_version
            .rsplit_once(KEY_SEPARATOR)
            .map_or("", |(group, _)| group)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.api_version
            .rsplit_once(KEY_SEPARATOR)
            .map_or(&*self.api_version, |(_, version)| version)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.api_version, self.kind)
    }
}

/// Parses `v1:Pod` or `apps/v1:Deployment`
impl FromStr for ResourceType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((api_version, kind)) if !api_version.is_empty() && !kind.is_empty() => {
                Ok(Self::new(api_version, kind))
            }
            _ => Err(crate::error::Error::Custom(format!(
                "invalid resource type '{s}', expected <apiVersion>:<Kind>"
            ))),
        }
    }
}

/// Namespaced name of one object; cluster-scoped objects use an empty namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    #[must_use]
    pub fn from_object(obj: &DynamicObject) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{KEY_SEPARATOR}{}", self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_and_version() {
        let deployments = ResourceType::new("apps/v1", "Deployment");
        assert_eq!(deployments.group(), "apps");
        assert_eq!(deployments.version(), "v1");

        let pods = ResourceType::new("v1", "Pod");
        assert_eq!(pods.group(), "");
        assert_eq!(pods.version(), "v1");
        assert_eq!(pods.to_string(), "v1/Pod");
    }

    #[test]
    fn test_parse_resource_type() {
        let parsed: ResourceType = "apps/v1:Deployment".parse().unwrap();
        assert_eq!(parsed, ResourceType::new("apps/v1", "Deployment"));
        assert!("Deployment".parse::<ResourceType>().is_err());
        assert!(":Pod".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_keys_do_not_collide() {
        // joining "a/b" + "c" and "a" + "b/c" as plain strings would collide
        let left = ResourceType::new("a/b", "c");
        let right = ResourceType::new("a", "b/c");
        assert_ne!(left, right);
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("default", "web").to_string(), "default/web");
        assert_eq!(ObjectKey::cluster_scoped("node-1").to_string(), "node-1");
    }
}
