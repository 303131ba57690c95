//! 状态令牌：{params, filters, persistentFilters} 的 JSON 经 base64 编码
//!
//! 解码失败不报错，退化为空补丁。

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::query::filter::Filter;
use crate::query::params::Params;

/// 可持久化的状态片段；字段缺省表示不恢复该部分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_filters: Option<Vec<Filter>>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        self.params.is_none() && self.filters.is_none() && self.persistent_filters.is_none()
    }
}

/// 编码为不透明令牌
pub fn serialize(patch: &StatePatch) -> String {
    // 仅含字符串键与标量，序列化不会失败
    let json = serde_json::to_vec(patch).unwrap_or_default();
    general_purpose::STANDARD.encode(json)
}

/// 解码令牌；任何格式错误都返回空补丁
pub fn deserialize(token: &str) -> StatePatch {
    let Ok(decoded) = general_purpose::STANDARD.decode(token.trim()) else {
        tracing::warn!("state token base64 decode error");
        return StatePatch::default();
    };
    match serde_json::from_slice::<StatePatch>(&decoded) {
        Ok(patch) => patch,
        Err(e) => {
            tracing::warn!("state token json decode error: {}", e);
            StatePatch::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::FilterMethod;
    use crate::query::params::ParamPatch;
    use serde_json::json;

    fn sample() -> StatePatch {
        let mut params = Params::new();
        params.merge(&ParamPatch::new().set("page", 2).set("sort", "title"));
        StatePatch {
            params: Some(params),
            filters: Some(vec![
                Filter::new("year_of_production", FilterMethod::Range, (1900, 2008)),
                Filter::new("_", FilterMethod::Query, "Foo"),
            ]),
            persistent_filters: Some(vec![Filter::new("tenant", FilterMethod::Eq, true)]),
        }
    }

    #[test]
    fn test_round_trip() {
        let patch = sample();
        assert_eq!(deserialize(&serialize(&patch)), patch);
    }

    #[test]
    fn test_wire_shape() {
        let decoded = general_purpose::STANDARD.decode(serialize(&sample())).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["persistentFilters"], json!([["tenant", "eq", true]]));
        assert_eq!(value["params"]["sort"], json!("title"));
    }

    #[test]
    fn test_malformed_token_yields_empty() {
        assert!(deserialize("%%% not base64").is_empty());
        assert!(deserialize(&general_purpose::STANDARD.encode("{not json")).is_empty());
        let bad_filter = general_purpose::STANDARD.encode(r#"{"filters": [["a", "nope"]]}"#);
        assert!(deserialize(&bad_filter).is_empty());
        assert!(deserialize("").is_empty());
    }
}
