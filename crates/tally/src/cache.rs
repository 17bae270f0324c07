//! Process-wide memoized identity.
//!
//! [`IdentityCache`] wraps an [`IdentityStore`] so storage is touched at
//! most once per process, until [`IdentityCache::invalidate`] is called.
//! Build one at startup, share it via `Arc<IdentityCache>`, and hand it to
//! the dispatcher.
//!
//! The memo is never refreshed behind the caller's back. Deleting the
//! backing file after the first load has no effect on the cached value.

use std::sync::{Mutex, PoisonError};

use tally_types::UserId;
use tracing::debug;

use crate::error::TelemetryError;
use crate::store::IdentityStore;

/// Memoizing accessor for the installation identifier.
pub struct IdentityCache {
    /// Where the identifier is loaded from on a cache miss.
    store: Box<dyn IdentityStore>,
    /// Memoized identifier. The lock is held across the load so concurrent
    /// first calls perform a single store access.
    cached: Mutex<Option<UserId>>,
}

impl IdentityCache {
    /// Cache in front of `store`. Nothing is loaded until first use.
    pub fn new(store: impl IdentityStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            cached: Mutex::new(None),
        }
    }

    /// Return the identifier, loading it from the store on the first call.
    ///
    /// A failed load is not memoized; the next call tries the store again.
    pub fn get_userid(&self) -> Result<UserId, TelemetryError> {
        // A panic elsewhere while holding the lock cannot leave the
        // Option in a torn state, so a poisoned lock is still usable.
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(user_id) = cached.as_ref() {
            return Ok(user_id.clone());
        }

        let user_id = self.store.load_or_create()?;
        debug!("telemetry identity loaded");
        *cached = Some(user_id.clone());
        Ok(user_id)
    }

    /// The memoized identifier, without touching storage.
    pub fn cached(&self) -> Option<UserId> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the memoized identifier. The next
    /// [`get_userid`](Self::get_userid) reloads from the store.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl core::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("cached", &self.cached())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::store::{IDENTITY_FILE_NAME, JsonFileStore};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    /// Store that counts loads and hands out a new id every time.
    #[derive(Clone, Default)]
    struct CountingStore {
        loads: Arc<AtomicUsize>,
    }

    impl IdentityStore for CountingStore {
        fn load_or_create(&self) -> Result<UserId, TelemetryError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(UserId::generate())
        }
    }

    /// Store that always fails to persist.
    struct FailingStore;

    impl IdentityStore for FailingStore {
        fn load_or_create(&self) -> Result<UserId, TelemetryError> {
            Err(TelemetryError::storage(
                "/unwritable/uuid.json",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }
    }

    #[test]
    fn loads_once_and_memoizes() -> TestResult {
        let store = CountingStore::default();
        let cache = IdentityCache::new(store.clone());
        assert!(cache.cached().is_none());

        let first = cache.get_userid()?;
        let second = cache.get_userid()?;
        assert_eq!(first, second);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached(), Some(first));
        Ok(())
    }

    #[test]
    fn invalidate_forces_reload() -> TestResult {
        let store = CountingStore::default();
        let cache = IdentityCache::new(store.clone());

        let first = cache.get_userid()?;
        cache.invalidate();
        assert!(cache.cached().is_none());
        let second = cache.get_userid()?;

        assert_ne!(first, second);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn failures_are_not_memoized() {
        let cache = IdentityCache::new(FailingStore);
        assert!(matches!(
            cache.get_userid(),
            Err(TelemetryError::Storage { .. })
        ));
        assert!(cache.cached().is_none());
    }

    #[test]
    fn concurrent_first_calls_load_once() -> TestResult {
        let store = CountingStore::default();
        let cache = Arc::new(IdentityCache::new(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_userid().ok())
            })
            .collect();
        let ids: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().ok().flatten())
            .collect();

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        let expected = cache.get_userid()?;
        assert!(ids.iter().all(|id| id.as_ref() == Some(&expected)));
        Ok(())
    }

    #[test]
    fn cached_value_survives_file_deletion() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("myapp").join(IDENTITY_FILE_NAME);
        let cache = IdentityCache::new(JsonFileStore::new(&path));

        let user_id = cache.get_userid()?;
        assert!(path.exists());
        let stored: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(
            stored.get("userid").and_then(serde_json::Value::as_str),
            Some(user_id.as_str())
        );

        std::fs::remove_file(&path)?;
        assert_eq!(cache.get_userid()?, user_id);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn invalidate_after_deletion_regenerates_and_rewrites() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IDENTITY_FILE_NAME);
        let cache = IdentityCache::new(JsonFileStore::new(&path));

        let original = cache.get_userid()?;
        std::fs::remove_file(&path)?;
        cache.invalidate();

        let regenerated = cache.get_userid()?;
        assert_ne!(original, regenerated);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn loads_prepopulated_file() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(IDENTITY_FILE_NAME);
        std::fs::write(&path, r#"{"userid": "test-userid"}"#)?;

        let cache = IdentityCache::new(JsonFileStore::new(&path));
        assert_eq!(cache.get_userid()?.as_str(), "test-userid");
        Ok(())
    }
}
