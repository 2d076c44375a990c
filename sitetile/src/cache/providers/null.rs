//! Provider that stores nothing.

use std::time::Duration;

use crate::cache::traits::{BoxFuture, Cache, ServiceCacheError};

/// Cache provider used when caching is switched off.
///
/// Every lookup misses and every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheProvider;

impl Cache for NullCacheProvider {
    fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> BoxFuture<'_, Result<(), ServiceCacheError>> {
        Box::pin(async { Ok(()) })
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, ServiceCacheError>> {
        Box::pin(async { Ok(None) })
    }

    fn delete(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        Box::pin(async { Ok(false) })
    }

    fn contains(&self, _key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>> {
        Box::pin(async { Ok(false) })
    }

    fn entry_count(&self) -> Option<u64> {
        Some(0)
    }

    fn retains_entries(&self) -> bool {
        false
    }

    fn provider_name(&self) -> &'static str {
        "none"
    }
}
