//! View-model over the platform key-value set.
//!
//! The local cache is only a copy of the last successful fetch. Every mutation is
//! followed by a full refresh, and mutations on one instance never interleave.

use crate::error::{ExplorerError, Result};
use crate::platform::{KeyValueCapability, ResourceEntry};
use crate::session_gate::SessionGate;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCollection {
    pub entries: Vec<ResourceEntry>,
    /// Set after a mutation until the next successful refresh.
    pub stale: bool,
}

impl ResourceCollection {
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }
}

pub struct RemoteResourceViewModel {
    gate: Arc<SessionGate>,
    store: Arc<dyn KeyValueCapability>,
    cache: RwLock<ResourceCollection>,
    // FIFO: queued mutations (and lists) run in arrival order.
    mutation: Mutex<()>,
}

impl RemoteResourceViewModel {
    pub fn new(gate: Arc<SessionGate>, store: Arc<dyn KeyValueCapability>) -> Self {
        Self {
            gate,
            store,
            cache: RwLock::new(ResourceCollection::default()),
            mutation: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> ResourceCollection {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches the full collection and replaces the cache.
    pub async fn list(&self) -> Result<ResourceCollection> {
        self.gate.require()?;
        let _guard = self.mutation.lock().await;
        self.refresh().await
    }

    pub async fn upsert(&self, key: &str, value: Value) -> Result<ResourceCollection> {
        if key.trim().is_empty() {
            return Err(ExplorerError::InvalidKey);
        }
        self.gate.require()?;
        let _guard = self.mutation.lock().await;

        self.store
            .set(key, value)
            .await
            .map_err(|err| ExplorerError::FetchFailed(err.to_string()))?;
        info!(key, "entry written");
        self.refresh_after_write().await
    }

    pub async fn remove(&self, key: &str) -> Result<ResourceCollection> {
        self.gate.require()?;
        let _guard = self.mutation.lock().await;

        // Advisory: the platform might still know the key even if our copy does not.
        if !self.snapshot().contains_key(key) {
            return Err(ExplorerError::KeyNotFound(key.to_string()));
        }

        self.store
            .del(key)
            .await
            .map_err(|err| ExplorerError::FetchFailed(err.to_string()))?;
        info!(key, "entry deleted");
        self.refresh_after_write().await
    }

    async fn refresh_after_write(&self) -> Result<ResourceCollection> {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .stale = true;
        self.refresh().await.map_err(|err| {
            warn!(error = %err, "refresh after write failed");
            match err {
                ExplorerError::FetchFailed(message) => ExplorerError::StaleAfterWrite(message),
                other => other,
            }
        })
    }

    // Caller holds `mutation`.
    async fn refresh(&self) -> Result<ResourceCollection> {
        let entries = self
            .store
            .list(true)
            .await
            .map_err(|err| ExplorerError::FetchFailed(err.to_string()))?;
        debug!(count = entries.len(), "collection refreshed");

        let fresh = ResourceCollection {
            entries,
            stale: false,
        };
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{MemoryAuth, MemoryKv};
    use crate::platform::PlatformResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Records every call and holds the first `set` until released.
    #[derive(Default)]
    struct GatedKv {
        inner: MemoryKv,
        log: StdMutex<Vec<String>>,
        held: AtomicBool,
        first_set_started: Notify,
        release: Notify,
    }

    impl GatedKv {
        fn record(&self, call: String) {
            self.log.lock().expect("log lock").push(call);
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().expect("log lock").clone()
        }
    }

    #[async_trait]
    impl KeyValueCapability for GatedKv {
        async fn list(&self, include_metadata: bool) -> PlatformResult<Vec<ResourceEntry>> {
            self.record("list".to_string());
            self.inner.list(include_metadata).await
        }

        async fn set(&self, key: &str, value: Value) -> PlatformResult<()> {
            self.record(format!("set {key}"));
            if !self.held.swap(true, Ordering::SeqCst) {
                self.first_set_started.notify_one();
                self.release.notified().await;
            }
            self.inner.set(key, value).await
        }

        async fn del(&self, key: &str) -> PlatformResult<()> {
            self.record(format!("del {key}"));
            self.inner.del(key).await
        }
    }

    async fn signed_in(username: &str) -> (Arc<MemoryKv>, RemoteResourceViewModel) {
        let gate = Arc::new(SessionGate::new(Arc::new(MemoryAuth::new(username))));
        gate.ensure_signed_in().await.expect("sign-in should succeed");
        let kv = Arc::new(MemoryKv::default());
        let view_model = RemoteResourceViewModel::new(gate, kv.clone());
        (kv, view_model)
    }

    #[tokio::test]
    async fn operations_require_sign_in() {
        let gate = Arc::new(SessionGate::new(Arc::new(MemoryAuth::new("alice"))));
        let kv = Arc::new(MemoryKv::default());
        let view_model = RemoteResourceViewModel::new(gate, kv.clone());

        assert!(matches!(
            view_model.list().await,
            Err(ExplorerError::NotAuthenticated)
        ));
        assert!(matches!(
            view_model.upsert("k", json!("v")).await,
            Err(ExplorerError::NotAuthenticated)
        ));
        assert_eq!(kv.calls().list + kv.calls().set, 0);
    }

    #[tokio::test]
    async fn upsert_then_list_contains_the_entry() {
        let (_kv, view_model) = signed_in("alice").await;
        for (key, value) in [("a", "1"), ("b", "2"), ("a", "3")] {
            view_model
                .upsert(key, json!(value))
                .await
                .expect("upsert should succeed");
            let listed = view_model.list().await.expect("list should succeed");
            assert_eq!(listed.get(key), Some(&json!(value)));
            assert!(!listed.stale);
        }
    }

    #[tokio::test]
    async fn alice_scenario() {
        let (_kv, view_model) = signed_in("alice").await;

        assert!(view_model.list().await.expect("list").entries.is_empty());

        view_model
            .upsert("greeting", json!("hi"))
            .await
            .expect("upsert should succeed");
        let listed = view_model.list().await.expect("list");
        assert_eq!(listed.entries, vec![ResourceEntry::new("greeting", "hi")]);

        view_model.remove("greeting").await.expect("remove should succeed");
        assert!(view_model.list().await.expect("list").entries.is_empty());
    }

    #[tokio::test]
    async fn empty_key_is_rejected_without_a_remote_call() {
        let (kv, view_model) = signed_in("alice").await;
        for key in ["", "   "] {
            assert!(matches!(
                view_model.upsert(key, json!("v")).await,
                Err(ExplorerError::InvalidKey)
            ));
        }
        assert_eq!(kv.calls().set, 0);
    }

    #[tokio::test]
    async fn removing_an_unknown_key_skips_the_platform() {
        let (kv, view_model) = signed_in("alice").await;
        view_model.list().await.expect("list should succeed");

        let err = view_model
            .remove("missing")
            .await
            .expect_err("unknown key should fail");
        assert!(matches!(err, ExplorerError::KeyNotFound(key) if key == "missing"));
        assert_eq!(kv.calls().del, 0);
    }

    #[tokio::test]
    async fn failed_refresh_after_write_reports_stale() {
        let (kv, view_model) = signed_in("alice").await;
        view_model.list().await.expect("list should succeed");
        kv.fail_lists(true);

        let err = view_model
            .upsert("greeting", json!("hi"))
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, ExplorerError::StaleAfterWrite(_)));
        assert_eq!(kv.stored("greeting"), Some(json!("hi")));

        let cached = view_model.snapshot();
        assert!(cached.stale);
        assert!(!cached.contains_key("greeting"));

        kv.fail_lists(false);
        let refreshed = view_model.list().await.expect("list should recover");
        assert!(!refreshed.stale);
        assert!(refreshed.contains_key("greeting"));
    }

    #[tokio::test]
    async fn failed_list_keeps_previous_cache() {
        let (kv, view_model) = signed_in("alice").await;
        view_model.upsert("a", json!("1")).await.expect("upsert");
        kv.fail_lists(true);

        assert!(matches!(
            view_model.list().await,
            Err(ExplorerError::FetchFailed(_))
        ));
        assert!(view_model.snapshot().contains_key("a"));
    }

    #[tokio::test]
    async fn concurrent_mutations_all_land() {
        let (kv, view_model) = signed_in("alice").await;
        let view_model = Arc::new(view_model);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let view_model = Arc::clone(&view_model);
                tokio::spawn(async move {
                    view_model
                        .upsert(&format!("key{i}"), json!(i))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("task should join").expect("upsert should succeed");
        }

        let cached = view_model.snapshot();
        assert_eq!(cached.entries.len(), 8);
        assert!(!cached.stale);
        assert_eq!(kv.calls().set, 8);
        assert_eq!(kv.calls().list, 8);
    }

    #[tokio::test]
    async fn queued_upsert_waits_for_the_previous_refresh() {
        let gate = Arc::new(SessionGate::new(Arc::new(MemoryAuth::new("alice"))));
        gate.ensure_signed_in().await.expect("sign-in should succeed");
        let kv = Arc::new(GatedKv::default());
        let view_model = Arc::new(RemoteResourceViewModel::new(gate, kv.clone()));

        let first = tokio::spawn({
            let view_model = Arc::clone(&view_model);
            async move { view_model.upsert("greeting", json!("hi")).await }
        });
        kv.first_set_started.notified().await;

        let second = tokio::spawn({
            let view_model = Arc::clone(&view_model);
            async move { view_model.upsert("greeting", json!("hello")).await }
        });
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert_eq!(kv.log(), vec!["set greeting"]);

        kv.release.notify_one();
        first
            .await
            .expect("task should join")
            .expect("first upsert should succeed");
        second
            .await
            .expect("task should join")
            .expect("second upsert should succeed");

        assert_eq!(
            kv.log(),
            vec!["set greeting", "list", "set greeting", "list"]
        );
        let cached = view_model.snapshot();
        assert_eq!(cached.get("greeting"), Some(&json!("hello")));
        assert!(!cached.stale);
    }

    #[tokio::test]
    async fn failed_refresh_after_remove_reports_stale() {
        let (kv, view_model) = signed_in("alice").await;
        view_model.upsert("greeting", json!("hi")).await.expect("upsert");
        kv.fail_lists(true);

        let err = view_model
            .remove("greeting")
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, ExplorerError::StaleAfterWrite(_)));
        assert_eq!(kv.stored("greeting"), None);

        let cached = view_model.snapshot();
        assert!(cached.stale);
        assert!(cached.contains_key("greeting"));
    }
}
