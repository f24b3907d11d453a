use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::models::TempId;

/// Hands out temporary message ids: a per-allocator random prefix plus a
/// monotonic counter, so two sends in the same clock tick never collide.
#[derive(Debug)]
pub struct TempIdAllocator {
    prefix: String,
    next: AtomicU64,
}

impl TempIdAllocator {
    pub fn new() -> Self {
        let mut prefix = Uuid::new_v4().simple().to_string();
        prefix.truncate(8);
        TempIdAllocator {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> TempId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        TempId(format!("tmp-{}-{}", self.prefix, seq))
    }
}

impl Default for TempIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
