//! 搜索会话：请求协调与结果对账
//!
//! 状态机 Idle → Preparing → Awaiting → {Reconciled | Superseded | Failed}。
//! 每次 fire 先 prepare（请求序号 +1），执行器调用是唯一的挂起点；期间允许继续变更状态甚至再次 fire。
//! 响应返回时若序号已不是最新，则丢弃结果并返回 `SearchError::Superseded`，不做任何状态修改。
//! 不向下游发送取消信号，「取消」只发生在对账时。

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::SearchError;
use crate::fetch::executor::SearchExecutor;
use crate::fetch::location::Location;
use crate::query::{
    token, ExtractedValues, Filter, FilterMethod, FilterValues, ParamPatch, Params, QueryState,
    ResultView,
};

/// 每次 prepare / fire 结束后收到完整快照
pub type UpdateCallback = Arc<dyn Fn(&SearchSnapshot) + Send + Sync>;

/// 会话状态的只读快照（交给 update 回调与 fire 的调用方）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchSnapshot {
    pub request_id: u64,
    pub running: bool,
    pub params: Params,
    pub filters: Vec<Filter>,
    pub persistent_filters: Vec<Filter>,
    pub fixed_order: Option<Vec<Value>>,
    #[serde(flatten)]
    pub view: ResultView,
    pub objects: Vec<Value>,
    pub aggregations: Map<String, Value>,
    pub total_count: u64,
    pub total_pages: u64,
}

impl From<&QueryState> for SearchSnapshot {
    fn from(state: &QueryState) -> Self {
        Self {
            request_id: state.request_sequence(),
            running: state.running(),
            params: state.params().clone(),
            filters: state.filters().to_vec(),
            persistent_filters: state.persistent_filters().to_vec(),
            fixed_order: state.fixed_order().map(<[Value]>::to_vec),
            view: state.view().clone(),
            objects: state.objects().to_vec(),
            aggregations: state.aggregations().clone(),
            total_count: state.total_count(),
            total_pages: state.total_pages(),
        }
    }
}

pub(crate) struct SessionParts {
    pub state: QueryState,
    pub executor: Arc<dyn SearchExecutor>,
    pub stats: Option<Value>,
    pub schema: Option<String>,
    pub update: Option<UpdateCallback>,
    pub location: Option<(Arc<dyn Location>, String)>,
}

struct Inner {
    state: Mutex<QueryState>,
    executor: Arc<dyn SearchExecutor>,
    stats: Option<Value>,
    schema: Option<String>,
    update: Option<UpdateCallback>,
    /// 状态令牌写入的位置与参数名
    location: Option<(Arc<dyn Location>, String)>,
}

/// 搜索会话句柄（克隆共享同一状态）；变更方法返回 `&Self` 以便链式调用
#[derive(Clone)]
pub struct SearchSession {
    inner: Arc<Inner>,
}

impl SearchSession {
    pub(crate) fn from_parts(parts: SessionParts) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(parts.state),
                executor: parts.executor,
                stats: parts.stats,
                schema: parts.schema,
                update: parts.update,
                location: parts.location,
            }),
        }
    }

    // ---- 过滤条件 ----

    pub fn set_filter(
        &self,
        attribute: impl Into<String>,
        method: FilterMethod,
        values: impl Into<FilterValues>,
    ) -> &Self {
        self.inner.state.lock().set_filter(attribute, method, values);
        self
    }

    pub fn drop_filters(&self, attribute: Option<&str>, method: Option<FilterMethod>) -> &Self {
        self.inner.state.lock().drop_filters(attribute, method);
        self
    }

    pub fn set_persistent_filter(
        &self,
        attribute: impl Into<String>,
        method: FilterMethod,
        values: impl Into<FilterValues>,
    ) -> &Self {
        self.inner
            .state
            .lock()
            .set_persistent_filter(attribute, method, values);
        self
    }

    pub fn get_filters(&self, attribute: Option<&str>, method: Option<FilterMethod>) -> Vec<Filter> {
        self.inner.state.lock().get_filters(attribute, method)
    }

    pub fn get_filter_values(&self, attribute: &str, method: FilterMethod) -> Option<ExtractedValues> {
        self.inner.state.lock().get_filter_values(attribute, method)
    }

    pub fn get_persistent_filters(&self) -> Vec<Filter> {
        self.inner.state.lock().persistent_filters().to_vec()
    }

    pub fn pristine(&self) -> bool {
        self.inner.state.lock().pristine()
    }

    // ---- 参数 ----

    pub fn set_params(&self, patch: impl Into<ParamPatch>) -> &Self {
        self.inner.state.lock().set_params(patch);
        self
    }

    pub fn drop_params<I, K>(&self, keys: I) -> &Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        self.inner.state.lock().drop_params(keys);
        self
    }

    pub fn set_fixed_order<I, V>(&self, ids: I) -> &Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.inner.state.lock().set_fixed_order(ids);
        self
    }

    pub fn get_aggregations(&self, attribute: &str) -> Value {
        self.inner.state.lock().get_aggregations(attribute)
    }

    // ---- 状态视图 ----

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot::from(&*self.inner.state.lock())
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running()
    }

    pub fn request_id(&self) -> u64 {
        self.inner.state.lock().request_sequence()
    }

    /// 当前 {params, filters, persistentFilters} 的不透明令牌
    pub fn serialize(&self) -> String {
        token::serialize(&self.inner.state.lock().to_patch())
    }

    // ---- 请求生命周期 ----

    /// 立即进入 loading 状态并通知 update；fire 内部也会调用
    pub fn prepare(&self) -> &Self {
        self.inner.state.lock().prepare();
        self.publish();
        self
    }

    /// 发出请求并对账
    ///
    /// 返回值：
    /// - `Ok(snapshot)`：本次请求仍是最新，结果已写入状态
    /// - `Err(SearchError::Superseded { .. })`：期间有更新的 fire，结果已丢弃（不是失败）
    /// - `Err(SearchError::Executor(_))`：执行器失败，running 复位，结果字段保持不变
    pub async fn fire(&self) -> Result<SearchSnapshot, SearchError> {
        let (request_id, request) = {
            let mut state = self.inner.state.lock();
            let request_id = state.prepare();
            let request = state.build_request(self.inner.stats.as_ref(), self.inner.schema.as_deref());
            (request_id, request)
        };
        self.publish();
        tracing::debug!("search request {} issued", request_id);

        let outcome = self.inner.executor.execute(request).await;

        let result = {
            let mut state = self.inner.state.lock();
            let reconciled = match outcome {
                Ok(response) => state
                    .reconcile(request_id, response)
                    .map(|()| SearchSnapshot::from(&*state)),
                Err(e) => state.fail(request_id).and(Err(SearchError::Executor(e))),
            };
            reconciled
        };

        match &result {
            Ok(snapshot) => {
                tracing::info!(
                    "search request {} reconciled: {} objects, total {}",
                    request_id,
                    snapshot.objects.len(),
                    snapshot.total_count
                );
                self.write_location();
                self.notify(snapshot);
            }
            Err(SearchError::Superseded { latest, .. }) => {
                tracing::debug!("search request {} superseded by {}", request_id, latest);
            }
            Err(e) => {
                tracing::warn!("search request {} failed: {}", request_id, e);
                self.publish();
            }
        }
        result
    }

    /// 在锁外调用 update，回调内可以安全地再次操作会话
    pub(crate) fn publish(&self) {
        if self.inner.update.is_some() {
            let snapshot = self.snapshot();
            self.notify(&snapshot);
        }
    }

    fn notify(&self, snapshot: &SearchSnapshot) {
        if let Some(update) = &self.inner.update {
            update(snapshot);
        }
    }

    fn write_location(&self) {
        if let Some((location, param)) = &self.inner.location {
            let mut query = location.read();
            query.insert(param.clone(), self.serialize());
            location.write(query);
        }
    }
}
