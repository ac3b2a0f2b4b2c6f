use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::{assets::Asset, types::Script};

/// Scripts from the last successful run, together with the assets their
/// scenes may point at.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub run_id: Uuid,
    pub scripts: Arc<Vec<Script>>,
    pub assets: Arc<Vec<Asset>>,
}

#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<Option<StoredResult>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, run_id: Uuid, scripts: Vec<Script>, assets: Vec<Asset>) -> StoredResult {
        let result = StoredResult {
            run_id,
            scripts: Arc::new(scripts),
            assets: Arc::new(assets),
        };
        *self.inner.write().expect("ResultStore poisoned") = Some(result.clone());
        result
    }

    pub fn current(&self) -> Option<StoredResult> {
        self.inner.read().expect("ResultStore poisoned").clone()
    }

    pub fn scripts(&self) -> Arc<Vec<Script>> {
        self.current()
            .map(|r| r.scripts)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("ResultStore poisoned").is_none()
    }

    pub fn clear(&self) {
        self.inner.write().expect("ResultStore poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str) -> Script {
        Script {
            concept_name: name.to_string(),
            insight: String::new(),
            hook: String::new(),
            hashtags: vec![],
            scenes: vec![],
        }
    }

    #[test]
    fn publish_replaces_previous_result() {
        let store = ResultStore::new();
        assert!(store.is_empty());

        store.publish(Uuid::new_v4(), vec![script("first")], vec![]);
        let second = Uuid::new_v4();
        store.publish(second, vec![script("second"), script("third")], vec![]);

        let current = store.current().unwrap();
        assert_eq!(current.run_id, second);
        assert_eq!(store.scripts().len(), 2);
        assert_eq!(store.scripts()[0].concept_name, "second");
    }

    #[test]
    fn clear_empties_the_store() {
        let store = ResultStore::new();
        store.publish(Uuid::new_v4(), vec![script("x")], vec![]);
        store.clear();
        assert!(store.is_empty());
        assert!(store.scripts().is_empty());
    }
}
