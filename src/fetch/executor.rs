//! 搜索执行器抽象
//!
//! 实际的网络 / 检索后端由调用方提供，实现 SearchExecutor；也可用 `executor_fn` 直接包装异步闭包。

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ExecutorError;
use crate::query::Params;

/// 交给执行器的请求：完整请求体、原始参数与透传的 schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub body: Value,
    pub params: Params,
    pub schema: Option<String>,
}

/// 分页信息，缺省字段按 0 处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u64,
}

/// 执行器的成功返回
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub objects: Vec<Value>,
    #[serde(default)]
    pub aggregations: Map<String, Value>,
    #[serde(default)]
    pub pagination: Pagination,
}

/// 执行器 trait：一次调用即一个挂起点，不支持取消
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    async fn execute(&self, request: SearchRequest) -> Result<SearchResponse, ExecutorError>;
}

/// 把异步闭包适配为 SearchExecutor，见 [`executor_fn`]
pub struct FnExecutor<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> SearchExecutor for FnExecutor<F>
where
    F: Fn(SearchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SearchResponse, ExecutorError>> + Send,
{
    async fn execute(&self, request: SearchRequest) -> Result<SearchResponse, ExecutorError> {
        (self.f)(request).await
    }
}

/// 包装异步闭包：`executor_fn(|req| async move { ... })`
pub fn executor_fn<F, Fut>(f: F) -> FnExecutor<F>
where
    F: Fn(SearchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<SearchResponse, ExecutorError>> + Send,
{
    FnExecutor { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_pagination_defaults() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "objects": [{"id": 1}],
            "pagination": {}
        }))
        .unwrap();
        assert_eq!(resp.pagination, Pagination::default());
        assert!(resp.aggregations.is_empty());

        let bare: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert!(bare.objects.is_empty());
    }

    #[tokio::test]
    async fn test_executor_fn() {
        let executor = executor_fn(|req: SearchRequest| async move {
            Ok(SearchResponse {
                objects: vec![req.body],
                ..Default::default()
            })
        });
        let request = SearchRequest {
            body: json!({"page": 1}),
            params: Params::new(),
            schema: None,
        };
        let resp = executor.execute(request).await.unwrap();
        assert_eq!(resp.objects, vec![json!({"page": 1})]);
    }
}
