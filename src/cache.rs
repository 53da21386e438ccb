/*
 * A small request cache keyed by resource path
 *
 * Values only change through a load or an explicit `set`; nothing is refetched
 * in the background. An entry lives until its key is invalidated, which the
 * edit view does whenever a load for that key fails.
 */
use std::collections::HashMap;
use std::future::Future;

use async_std::sync::RwLock;
use log::*;

use crate::client::ApiError;

/**
 * Result of asking the cache for a key
 */
#[derive(Clone, Debug, PartialEq)]
pub enum Fetched<T> {
    /**
     * There was no key, so nothing was requested
     */
    Idle,
    Loaded(T),
    Failed(ApiError),
}

#[derive(Debug)]
pub struct RequestCache<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> Default for RequestCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> RequestCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.entries.read().await.get(key).cloned()
    }

    /**
     * Replace the cached value without going back to the loader
     */
    pub async fn set(&self, key: &str, value: T) {
        debug!("Cache set: {}", key);
        self.entries.write().await.insert(key.to_string(), value);
    }

    pub async fn invalidate(&self, key: &str) -> Option<T> {
        debug!("Cache invalidate: {}", key);
        self.entries.write().await.remove(key)
    }

    /**
     * Run the loader for `key` and remember what it returns
     *
     * A `None` key never calls the loader. Failures are returned but leave any
     * previously cached value alone.
     */
    pub async fn fetch<F, Fut>(&self, key: Option<&str>, loader: F) -> Fetched<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let key = match key {
            Some(key) => key,
            None => return Fetched::Idle,
        };

        match loader().await {
            Ok(value) => {
                self.set(key, value.clone()).await;
                Fetched::Loaded(value)
            }
            Err(err) => {
                debug!("Loader for {} failed: {}", key, err);
                Fetched::Failed(err)
            }
        }
    }

    /**
     * Like `fetch`, but a cached value is returned as-is
     */
    pub async fn get_or_fetch<F, Fut>(&self, key: Option<&str>, loader: F) -> Fetched<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(key) = key {
            if let Some(value) = self.get(key).await {
                return Fetched::Loaded(value);
            }
        }
        self.fetch(key, loader).await
    }
}
