use super::listener::SharedListener;
use super::resource::ResourceType;

/// Per-type sync bookkeeping, owned by the type's sync loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMetadata {
    /// Last cursor seen; `None` forces a full list before the next stream
    pub resume_token: Option<String>,
    /// Stream path, resolved on the first successful list
    pub path: Option<String>,
}

/// Resource types to mirror and the listeners interested in each, in
/// registration order. Consumed when the cache starts.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: Vec<(ResourceType, Vec<SharedListener>)>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a type without a listener; repeated declarations are no-ops
    pub fn declare(&mut self, resource: &ResourceType) {
        self.entry(resource);
    }

    pub fn register(&mut self, resource: &ResourceType, listener: SharedListener) {
        self.entry(resource).push(listener);
    }

    #[must_use]
    pub fn contains(&self, resource: &ResourceType) -> bool {
        self.entries.iter().any(|(rt, _)| rt == resource)
    }

    #[must_use]
    pub fn listener_count(&self, resource: &ResourceType) -> usize {
        self.entries
            .iter()
            .find(|(rt, _)| rt == resource)
            .map_or(0, |(_, listeners)| listeners.len())
    }

    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.entries.iter().map(|(rt, _)| rt)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(ResourceType, Vec<SharedListener>)> {
        self.entries
    }

    fn entry(&mut self, resource: &ResourceType) -> &mut Vec<SharedListener> {
        let position = match self.entries.iter().position(|(rt, _)| rt == resource) {
            Some(position) => position,
            None => {
                self.entries.push((resource.clone(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }
}
