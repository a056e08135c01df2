//! AutoRunLimit - 同時実行数の上限
//!
//! auto-run を無効にすると上限は 0 になり、NEW のタスクは起動されずに溜まる。
//! 有効に戻すと設定値が復元される。

use std::sync::atomic::{AtomicUsize, Ordering};

/// 同時に WORKING / STOPPING でいられるタスク数の上限
#[derive(Debug)]
pub struct AutoRunLimit {
    limit: AtomicUsize,
    configured: usize,
}

impl AutoRunLimit {
    pub fn new(configured: usize) -> Self {
        Self {
            limit: AtomicUsize::new(configured),
            configured,
        }
    }

    /// 現在の上限（無効時は 0）
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn configured(&self) -> usize {
        self.configured
    }

    pub fn is_enabled(&self) -> bool {
        self.limit() > 0
    }

    pub fn set_enabled(&self, enabled: bool) {
        let limit = if enabled { self.configured } else { 0 };
        self.limit.store(limit, Ordering::Relaxed);
    }
}
