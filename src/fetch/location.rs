//! 页面位置（查询串）读写能力
//!
//! 核心不直接触碰全局位置状态，由调用方注入 Location 实现；MemoryLocation 用于测试与演示。

use std::collections::BTreeMap;

use parking_lot::Mutex;

/// 查询串键值表
pub type QueryMap = BTreeMap<String, String>;

/// 查询串读写能力
pub trait Location: Send + Sync {
    fn read(&self) -> QueryMap;
    fn write(&self, query: QueryMap);
}

/// 内存中的查询串
#[derive(Debug, Default)]
pub struct MemoryLocation {
    query: Mutex<QueryMap>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(query: QueryMap) -> Self {
        Self {
            query: Mutex::new(query),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.query.lock().get(key).cloned()
    }
}

impl Location for MemoryLocation {
    fn read(&self) -> QueryMap {
        self.query.lock().clone()
    }

    fn write(&self, query: QueryMap) {
        *self.query.lock() = query;
    }
}
