use crate::component::{ComponentKind, Producer, Sink, Transform};
use crate::manager::ManagerError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named components of one kind, ordered by name.
pub(crate) struct Named<T: ?Sized> {
    kind: ComponentKind,
    entries: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized> Named<T> {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, component: Arc<T>) -> Result<(), ManagerError> {
        self.ensure_absent(name)?;
        self.entries.insert(name.to_string(), component);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Arc<T>, ManagerError> {
        self.entries
            .remove(name)
            .ok_or_else(|| ManagerError::NotFound {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn ensure_absent(&self, name: &str) -> Result<(), ManagerError> {
        if self.contains(name) {
            return Err(ManagerError::AlreadyExists {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Owned copy of every entry, for use after the registry lock is released.
    pub fn entries(&self) -> Vec<(String, Arc<T>)> {
        self.entries
            .iter()
            .map(|(name, component)| (name.clone(), component.clone()))
            .collect()
    }
}

/// Every registered component, guarded together by the manager's registry lock.
pub(crate) struct Registry {
    pub producers: Named<dyn Producer>,
    pub transforms: Named<dyn Transform>,
    pub sinks: Named<dyn Sink>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            producers: Named::new(ComponentKind::Producer),
            transforms: Named::new(ComponentKind::Transform),
            sinks: Named::new(ComponentKind::Sink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::TransformError;
    use crate::domain::LogRecord;

    struct Identity;

    impl Transform for Identity {
        fn apply(&self, record: LogRecord) -> Result<Option<LogRecord>, TransformError> {
            Ok(Some(record))
        }
    }

    #[test]
    fn names_are_sorted_and_unique() {
        let mut registry = Registry::new();
        registry.transforms.insert("zeta", Arc::new(Identity)).unwrap();
        registry.transforms.insert("alpha", Arc::new(Identity)).unwrap();

        assert!(matches!(
            registry.transforms.insert("alpha", Arc::new(Identity)),
            Err(ManagerError::AlreadyExists {
                kind: ComponentKind::Transform,
                ..
            })
        ));
        assert_eq!(registry.transforms.names(), vec!["alpha", "zeta"]);

        assert!(registry.transforms.remove("alpha").is_ok());
        assert!(matches!(
            registry.transforms.remove("alpha"),
            Err(ManagerError::NotFound { .. })
        ));
    }
}
