//! 会话构建器
//!
//! 提供链式 API 组装执行器、stats / schema 透传、init / update 回调与 URL 状态持久化。

use std::sync::Arc;

use serde_json::Value;

use crate::config::SiftConfig;
use crate::core::SearchError;
use crate::fetch::executor::SearchExecutor;
use crate::fetch::location::Location;
use crate::fetch::session::{SearchSession, SearchSnapshot, SessionParts, UpdateCallback};
use crate::query::{token, QueryState};

type InitCallback = Box<dyn FnOnce(&SearchSession) + Send>;

/// 会话构建器
#[derive(Default)]
pub struct SessionBuilder {
    executor: Option<Arc<dyn SearchExecutor>>,
    stats: Option<Value>,
    schema: Option<String>,
    init: Option<InitCallback>,
    update: Option<UpdateCallback>,
    location: Option<Arc<dyn Location>>,
    config: SiftConfig,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置执行器（必需）
    pub fn executor(mut self, executor: impl SearchExecutor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    /// 共享已有的执行器
    pub fn shared_executor(mut self, executor: Arc<dyn SearchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// facet 请求配置，原样放入请求体的 `stats`
    pub fn stats(mut self, stats: Value) -> Self {
        self.stats = Some(stats);
        self
    }

    /// 原样透传给执行器，不做解释
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// 构建完成后、首次 fire 前调用一次
    pub fn init(mut self, init: impl FnOnce(&SearchSession) + Send + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// 构建后与每次 prepare / fire 结束时调用（被取代的请求不会触发）
    pub fn update(mut self, update: impl Fn(&SearchSnapshot) + Send + Sync + 'static) -> Self {
        self.update = Some(Arc::new(update));
        self
    }

    /// 启用 URL 持久化：构建时从 location 恢复状态，每次成功 fire 后写回
    pub fn serialize_to_url(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    pub fn config(mut self, config: SiftConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建会话：恢复 URL 状态 → 调用 init → 发布初始快照（不自动 fire）
    pub fn build(self) -> Result<SearchSession, SearchError> {
        let executor = self.executor.ok_or(SearchError::MissingExecutor)?;

        let mut state = QueryState::new(&self.config);
        let param = self.config.location.param.clone();
        if let Some(location) = &self.location {
            if let Some(encoded) = location.read().get(&param) {
                let restored = token::deserialize(encoded);
                tracing::debug!("restoring search state from location param '{}'", param);
                state.restore(restored);
            }
        }

        let session = SearchSession::from_parts(SessionParts {
            state,
            executor,
            stats: self.stats,
            schema: self.schema,
            update: self.update,
            location: self.location.map(|location| (location, param)),
        });

        if let Some(init) = self.init {
            init(&session);
        }
        session.publish();
        Ok(session)
    }

    /// 构建并立即执行首次 fire；返回会话与首次 fire 的结果
    pub async fn launch(self) -> Result<(SearchSession, Result<SearchSnapshot, SearchError>), SearchError> {
        let session = self.build()?;
        let first = session.fire().await;
        Ok((session, first))
    }
}
