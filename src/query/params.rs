//! 查询参数：分页、排序与调用方自定义键
//!
//! 不变式：参数表中不存在 null 值，缺省即未设置。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PAGE: &str = "page";
pub const PER: &str = "per";
pub const SORT: &str = "sort";
pub const ORDER: &str = "order";

/// 参数表（键 → 标量）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn page(&self) -> Option<u64> {
        self.get(PAGE).and_then(Value::as_u64)
    }

    pub fn per(&self) -> Option<u64> {
        self.get(PER).and_then(Value::as_u64)
    }

    pub fn sort(&self) -> Option<&str> {
        self.get(SORT).and_then(Value::as_str)
    }

    pub fn order(&self) -> Option<&str> {
        self.get(ORDER).and_then(Value::as_str)
    }

    /// 合并补丁：值为 null 的键被移除而非存储
    pub fn merge(&mut self, patch: &ParamPatch) {
        for (key, value) in &patch.0 {
            match value {
                Some(v) if !v.is_null() => {
                    self.0.insert(key.clone(), v.clone());
                }
                _ => {
                    self.0.remove(key);
                }
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 转为 JSON 对象（用于拼装请求体）
    pub fn to_json_map(&self) -> Map<String, Value> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// 参数补丁：`None` 或 `Value::Null` 表示删除该键
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamPatch(Vec<(String, Option<Value>)>);

impl ParamPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((key.into(), Some(value.into())));
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.0.push((key.into(), None));
        self
    }

    /// 补丁是否把 key 设为非空值
    pub fn sets(&self, key: &str) -> bool {
        self.0
            .iter()
            .any(|(k, v)| k == key && v.as_ref().is_some_and(|v| !v.is_null()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ParamPatch {
    fn from(map: Map<String, Value>) -> Self {
        ParamPatch(map.into_iter().map(|(k, v)| (k, Some(v))).collect())
    }
}

impl From<Params> for ParamPatch {
    fn from(params: Params) -> Self {
        ParamPatch(params.0.into_iter().map(|(k, v)| (k, Some(v))).collect())
    }
}

/// 非对象的 JSON 值视为空补丁
impl From<Value> for ParamPatch {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            _ => ParamPatch::default(),
        }
    }
}
