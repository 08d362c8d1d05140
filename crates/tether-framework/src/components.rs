//! Custom-id registry for message components.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::callback::Callback;
use crate::error::{DispatchError, DispatchResult};
use crate::ttl::{DEFAULT_TTL, TtlCache};

/// A registered component callback.
#[derive(Debug, Clone)]
pub struct CustomIdEntry {
    pub callback: Callback,
    /// Survives triggers until unregistered or expired.
    pub unlimited: bool,
}

/// Maps component custom ids to callbacks, with expiry.
///
/// Entries expire a fixed time after registration (15 minutes by default)
/// whether or not they have been triggered.
pub struct CustomIdRegistry {
    cache: Arc<TtlCache<String, CustomIdEntry>>,
}

impl CustomIdRegistry {
    /// Creates a registry with the default lifetime.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a registry whose entries live for `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(TtlCache::new(ttl)),
        }
    }

    /// Registers `callback` under `custom_id`, replacing any previous entry.
    pub fn register(&self, custom_id: impl Into<String>, callback: Callback, unlimited: bool) {
        let custom_id = custom_id.into();
        debug!(custom_id = %custom_id, unlimited, "Registering custom id");
        self.cache.insert(custom_id, CustomIdEntry { callback, unlimited });
    }

    /// Registers `callback` under a freshly generated custom id and returns it.
    pub fn register_generated(&self, callback: Callback, unlimited: bool) -> String {
        let custom_id = Uuid::new_v4().to_string();
        self.register(custom_id.clone(), callback, unlimited);
        custom_id
    }

    /// Removes a registration.
    ///
    /// A missing id is an error unless `not_exists_ok` is set.
    pub fn unregister(&self, custom_id: &str, not_exists_ok: bool) -> DispatchResult<()> {
        match self.cache.remove(custom_id) {
            Some(_) => {
                debug!(custom_id = %custom_id, "Unregistered custom id");
                Ok(())
            }
            None if not_exists_ok => Ok(()),
            None => Err(DispatchError::UntrackedInteraction {
                custom_id: custom_id.to_string(),
            }),
        }
    }

    /// Looks up the callback for a triggered component.
    ///
    /// Single-use entries are removed in the same step, so a second trigger
    /// fails with [`DispatchError::UntrackedInteraction`].
    pub fn trigger(&self, custom_id: &str) -> DispatchResult<CustomIdEntry> {
        self.cache.fetch(custom_id, |entry| !entry.unlimited)
            .ok_or_else(|| DispatchError::UntrackedInteraction {
                custom_id: custom_id.to_string(),
            })
    }

    pub fn contains(&self, custom_id: &str) -> bool {
        self.cache.contains(custom_id)
    }

    /// Drops expired registrations.
    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }

    /// Spawns a background task that drops expired registrations.
    pub fn spawn_sweeper(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        self.cache.spawn_sweeper(period, cancel)
    }
}

impl Default for CustomIdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::IntoCallback;

    fn noop() -> Callback {
        (|| async {}).into_callback()
    }

    #[test]
    fn test_single_use_entry_is_consumed() {
        let registry = CustomIdRegistry::new();
        registry.register("abc", noop(), false);

        assert!(registry.trigger("abc").is_ok());
        assert!(!registry.contains("abc"));
        assert!(matches!(
            registry.trigger("abc"),
            Err(DispatchError::UntrackedInteraction { custom_id }) if custom_id == "abc"
        ));
    }

    #[test]
    fn test_unlimited_entry_survives_triggers() {
        let registry = CustomIdRegistry::new();
        registry.register("menu", noop(), true);

        for _ in 0..5 {
            assert!(registry.trigger("menu").unwrap().unlimited);
        }
        tokio_test::assert_ok!(registry.unregister("menu", false));
        tokio_test::assert_err!(registry.trigger("menu"));
    }

    #[test]
    fn test_unregister_missing() {
        let registry = CustomIdRegistry::new();
        tokio_test::assert_ok!(registry.unregister("nope", true));
        assert!(matches!(
            registry.unregister("nope", false),
            Err(DispatchError::UntrackedInteraction { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_entry_expires() {
        let registry = CustomIdRegistry::with_ttl(Duration::from_secs(60));
        registry.register("menu", noop(), true);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(registry.trigger("menu").is_ok());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(registry.trigger("menu").is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let registry = CustomIdRegistry::new();
        let a = registry.register_generated(noop(), false);
        let b = registry.register_generated(noop(), false);
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
        assert!(registry.contains(&a));
    }
}
