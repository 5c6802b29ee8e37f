use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

use lru::LruCache;
use metrics::counter;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::service::ContentRenderer;
use super::types::RenderOptions;

pub const METRIC_MEMO_HIT_TOTAL: &str = "post_render_memo_hit_total";
pub const METRIC_MEMO_MISS_TOTAL: &str = "post_render_memo_miss_total";

const SOURCE: &str = "application::render::memo";

/// Bounded cache of finished outputs in front of a [`ContentRenderer`].
///
/// Entries are keyed by a digest of the content together with the serialized
/// options, so a change in either input misses. Only sanitized output is stored.
pub struct MemoizedRenderer {
    renderer: Arc<ContentRenderer>,
    cache: Mutex<LruCache<String, String>>,
}

impl MemoizedRenderer {
    pub fn new(renderer: Arc<ContentRenderer>, capacity: NonZeroUsize) -> Self {
        Self {
            renderer,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn render(&self, content: &str, options: &RenderOptions) -> String {
        let key = memo_key(content, options);

        if let Some(html) = mutex_lock(&self.cache, "get").get(&key).cloned() {
            counter!(METRIC_MEMO_HIT_TOTAL).increment(1);
            return html;
        }

        counter!(METRIC_MEMO_MISS_TOTAL).increment(1);
        let html = self.renderer.render(content, options);
        mutex_lock(&self.cache, "put").put(key, html.clone());
        html
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.cache, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.cache, "clear").clear();
    }
}

fn memo_key(content: &str, options: &RenderOptions) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(options) {
        Ok(encoded) => hasher.update(&encoded),
        // serde_json only fails on non-string map keys.
        Err(_) => hasher.update(format!("{options:?}").as_bytes()),
    }
    hasher.update([0_u8]);
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn mutex_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned memo lock"
            );
            poisoned.into_inner()
        }
    }
}
