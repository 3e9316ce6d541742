//! Error handling helper functions
//!
//! Provides safe alternatives to unwrap() for common patterns

use crate::error::{Result, SensorError};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Acquire a mutex lock, recovering from poisoned state if necessary
pub fn safe_mutex_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!(
            "Mutex poisoned in {}, recovering with potentially inconsistent state",
            context
        );
        poisoned.into_inner()
    })
}

/// Acquire a read lock, recovering from poisoned state if necessary
pub fn safe_read<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned in {} (read), recovering", context);
        poisoned.into_inner()
    })
}

/// Acquire a write lock, recovering from poisoned state if necessary
pub fn safe_write<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned in {} (write), recovering", context);
        poisoned.into_inner()
    })
}

/// Parse an http(s) URL with validation and context
pub fn parse_url_safe(url: &str, context: &str) -> Result<url::Url> {
    if url.is_empty() {
        return Err(SensorError::config(format!(
            "Empty URL provided for {context}"
        )));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(SensorError::config(format!(
            "Invalid URL scheme for {context}: {url}"
        )));
    }

    url::Url::parse(url)
        .map_err(|e| SensorError::config(format!("Failed to parse URL for {context} - {url}: {e}")))
}
