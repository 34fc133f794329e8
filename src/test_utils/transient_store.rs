//! Transient store for testing purposes.
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{ChallengeDigest, TransientStore};

/// Store that keeps challenge entries in memory.
#[derive(Default, Debug)]
pub struct MemoryTransientStore {
    entries: Mutex<HashMap<ChallengeDigest, String>>,
}

impl MemoryTransientStore {
    /// Returns `true` if an entry is recorded for `challenge_digest`.
    pub async fn contains(&self, challenge_digest: &ChallengeDigest) -> bool {
        self.entries.lock().await.contains_key(challenge_digest)
    }

    /// Returns the number of recorded entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if no entries are recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl TransientStore for MemoryTransientStore {
    async fn get(&self, challenge_digest: &ChallengeDigest) -> Option<String> {
        self.entries.lock().await.get(challenge_digest).cloned()
    }

    async fn put(&self, challenge_digest: ChallengeDigest, value: String) {
        self.entries.lock().await.insert(challenge_digest, value);
    }

    async fn delete(&self, challenge_digest: &ChallengeDigest) {
        self.entries.lock().await.remove(challenge_digest);
    }
}
