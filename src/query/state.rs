//! 查询状态：过滤条件、参数、固定排序覆盖与最近一次结果
//!
//! 纯数据与变更规则，不做任何 I/O。请求序号与结果字段的重置由 prepare / reconcile 维护，
//! 必须与 fire 的发出顺序保持一致，因此外部只能通过这里的方法修改状态。

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::SiftConfig;
use crate::core::SearchError;
use crate::fetch::{SearchRequest, SearchResponse};
use crate::query::filter::{ExtractedValues, Filter, FilterMethod, FilterValues};
use crate::query::params::{ParamPatch, Params, ORDER, PAGE, PER, SORT};
use crate::query::token::StatePatch;

/// 聚合（facet）键名约定：`count_by_<attribute>`
pub fn aggregation_key(attribute: &str) -> String {
    format!("count_by_{attribute}")
}

/// 对外可见的分页 / 排序视图（prepare 时从参数复制）
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultView {
    pub page: Option<u64>,
    pub per: Option<u64>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// 一次搜索会话的全部可变状态
#[derive(Clone, Debug)]
pub struct QueryState {
    params: Params,
    filters: Vec<Filter>,
    persistent_filters: Vec<Filter>,
    fixed_order: Option<Vec<Value>>,
    fixed_order_per: u64,
    request_sequence: u64,
    running: bool,
    view: ResultView,
    objects: Vec<Value>,
    aggregations: Map<String, Value>,
    total_count: u64,
    total_pages: u64,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(&SiftConfig::default())
    }
}

impl QueryState {
    /// 以配置中的默认参数创建（page=1, per=24, sort=created_at, order=desc）
    pub fn new(config: &SiftConfig) -> Self {
        let defaults = &config.defaults;
        let mut params = Params::new();
        params.merge(
            &ParamPatch::new()
                .set(PAGE, defaults.page)
                .set(PER, defaults.per)
                .set(SORT, defaults.sort.clone())
                .set(ORDER, defaults.order.clone()),
        );
        Self {
            params,
            filters: Vec::new(),
            persistent_filters: Vec::new(),
            fixed_order: None,
            fixed_order_per: config.fixed_order.per,
            request_sequence: 0,
            running: false,
            view: ResultView::default(),
            objects: Vec::new(),
            aggregations: Map::new(),
            total_count: 0,
            total_pages: 0,
        }
    }

    // ---- 过滤条件 ----

    /// 先移除同属性同族（q 为全局）的已有条件，再追加新条件；页码重置为 1
    pub fn set_filter(
        &mut self,
        attribute: impl Into<String>,
        method: FilterMethod,
        values: impl Into<FilterValues>,
    ) {
        let filter = Filter::new(attribute, method, values);
        self.filters
            .retain(|existing| !method.supersedes(&filter.attribute, existing));
        tracing::debug!("set filter {} {} {:?}", filter.attribute, method, filter.values);
        self.filters.push(filter);
        self.params.merge(&ParamPatch::new().set(PAGE, 1));
    }

    /// 移除匹配的非持久条件；两者皆为 None 时清空全部
    pub fn drop_filters(&mut self, attribute: Option<&str>, method: Option<FilterMethod>) {
        self.filters.retain(|f| !f.matches(attribute, method));
    }

    pub fn get_filters(&self, attribute: Option<&str>, method: Option<FilterMethod>) -> Vec<Filter> {
        self.filters
            .iter()
            .filter(|f| f.matches(attribute, method))
            .cloned()
            .collect()
    }

    /// 第一条匹配条件的取值部分
    pub fn get_filter_values(&self, attribute: &str, method: FilterMethod) -> Option<ExtractedValues> {
        self.filters
            .iter()
            .find(|f| f.matches(Some(attribute), Some(method)))
            .map(Filter::extract_values)
    }

    /// 持久条件只追加，不去重、不做族清除，drop_filters 无法移除
    pub fn set_persistent_filter(
        &mut self,
        attribute: impl Into<String>,
        method: FilterMethod,
        values: impl Into<FilterValues>,
    ) {
        self.persistent_filters.push(Filter::new(attribute, method, values));
    }

    pub fn persistent_filters(&self) -> &[Filter] {
        &self.persistent_filters
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// 没有任何非持久条件
    pub fn pristine(&self) -> bool {
        self.filters.is_empty()
    }

    // ---- 参数 ----

    /// 合并参数；补丁设置了 sort 或 order 时清除固定排序覆盖
    pub fn set_params(&mut self, patch: impl Into<ParamPatch>) {
        let patch = patch.into();
        if (patch.sets(SORT) || patch.sets(ORDER)) && self.fixed_order.take().is_some() {
            tracing::debug!("sort directive cleared fixed order");
        }
        self.params.merge(&patch);
    }

    pub fn drop_params<I, K>(&mut self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.params.remove(key.as_ref());
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// 安装客户端排序覆盖：服务端无法按任意 id 列表排序，只能取一大页再本地重排
    pub fn set_fixed_order(&mut self, ids: Vec<Value>) {
        self.set_params(
            ParamPatch::new()
                .unset(SORT)
                .unset(ORDER)
                .set(PAGE, 1)
                .set(PER, self.fixed_order_per),
        );
        self.fixed_order = Some(ids);
    }

    pub fn fixed_order(&self) -> Option<&[Value]> {
        self.fixed_order.as_deref()
    }

    /// 上次结果中的聚合；不存在时返回空数组
    pub fn get_aggregations(&self, attribute: &str) -> Value {
        self.aggregations
            .get(&aggregation_key(attribute))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()))
    }

    /// 合并令牌中恢复出的状态：参数按补丁合并，过滤条件整体替换
    pub fn restore(&mut self, patch: StatePatch) {
        if let Some(params) = patch.params {
            self.params.merge(&params.into());
        }
        if let Some(filters) = patch.filters {
            self.filters = filters;
        }
        if let Some(persistent) = patch.persistent_filters {
            self.persistent_filters = persistent;
        }
    }

    /// 当前可持久化部分
    pub fn to_patch(&self) -> StatePatch {
        StatePatch {
            params: Some(self.params.clone()),
            filters: Some(self.filters.clone()),
            persistent_filters: Some(self.persistent_filters.clone()),
        }
    }

    // ---- 请求生命周期 ----

    /// 进入 Preparing：running=true、序号 +1、复制分页排序视图、清空结果
    pub fn prepare(&mut self) -> u64 {
        self.running = true;
        self.request_sequence += 1;
        self.view = ResultView {
            page: self.params.page(),
            per: self.params.per(),
            sort: self.params.sort().map(str::to_string),
            order: self.params.order().map(str::to_string),
        };
        self.objects.clear();
        self.aggregations.clear();
        self.total_count = 0;
        self.total_pages = 0;
        self.request_sequence
    }

    /// 请求体 = params ∪ {search: {filters: persistent ++ filters}, stats?}
    pub fn build_request(&self, stats: Option<&Value>, schema: Option<&str>) -> SearchRequest {
        let mut body = self.params.to_json_map();
        let filters: Vec<&Filter> = self
            .persistent_filters
            .iter()
            .chain(self.filters.iter())
            .collect();
        body.insert("search".to_string(), json!({ "filters": filters }));
        if let Some(stats) = stats {
            body.insert("stats".to_string(), stats.clone());
        }
        SearchRequest {
            body: Value::Object(body),
            params: self.params.clone(),
            schema: schema.map(str::to_string),
        }
    }

    /// 对账：仅当 request_id 仍是最新序号时写入结果，否则返回 Superseded 且不改状态
    pub fn reconcile(&mut self, request_id: u64, response: SearchResponse) -> Result<(), SearchError> {
        self.ensure_current(request_id)?;
        let SearchResponse {
            mut objects,
            aggregations,
            pagination,
        } = response;
        if let Some(order) = &self.fixed_order {
            apply_fixed_order(&mut objects, order);
        }
        self.objects = objects;
        self.aggregations = aggregations;
        self.total_count = pagination.total_count;
        self.total_pages = pagination.total_pages;
        self.running = false;
        Ok(())
    }

    /// 执行器失败：仅复位 running，结果字段保持不变；过期请求的失败同样视为 Superseded
    pub fn fail(&mut self, request_id: u64) -> Result<(), SearchError> {
        self.ensure_current(request_id)?;
        self.running = false;
        Ok(())
    }

    fn ensure_current(&self, request_id: u64) -> Result<(), SearchError> {
        if request_id != self.request_sequence {
            return Err(SearchError::Superseded {
                request_id,
                latest: self.request_sequence,
            });
        }
        Ok(())
    }

    pub fn request_sequence(&self) -> u64 {
        self.request_sequence
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn view(&self) -> &ResultView {
        &self.view
    }

    pub fn objects(&self) -> &[Value] {
        &self.objects
    }

    pub fn aggregations(&self) -> &Map<String, Value> {
        &self.aggregations
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }
}

/// 按 id 在 order 中的位置稳定排序；不在列表中的排到末尾并保持原相对顺序
pub fn apply_fixed_order(objects: &mut [Value], order: &[Value]) {
    objects.sort_by_key(|object| {
        object
            .get("id")
            .and_then(|id| order.iter().position(|o| o == id))
            .unwrap_or(usize::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Pagination;
    use serde_json::json;

    fn response(objects: Vec<Value>) -> SearchResponse {
        SearchResponse {
            objects,
            aggregations: Map::new(),
            pagination: Pagination {
                total_count: 3,
                total_pages: 1,
            },
        }
    }

    #[test]
    fn test_defaults() {
        let state = QueryState::default();
        assert_eq!(state.params().page(), Some(1));
        assert_eq!(state.params().per(), Some(24));
        assert_eq!(state.params().sort(), Some("created_at"));
        assert_eq!(state.params().order(), Some("desc"));
        assert!(state.pristine());
        assert!(!state.running());
    }

    #[test]
    fn test_same_family_keeps_latest() {
        let mut state = QueryState::default();
        state.set_filter("color", FilterMethod::Eq, "red");
        state.set_filter("color", FilterMethod::Ne, "blue");
        state.set_filter("color", FilterMethod::Exist, ());

        let color = state.get_filters(Some("color"), None);
        assert_eq!(color.len(), 2);
        assert_eq!(color[0], Filter::new("color", FilterMethod::Ne, "blue"));
        assert_eq!(color[1].method, FilterMethod::Exist);

        state.set_filter("color", FilterMethod::NotExist, ());
        let color = state.get_filters(Some("color"), None);
        assert_eq!(color.len(), 2);
        assert_eq!(color[1].method, FilterMethod::NotExist);
    }

    #[test]
    fn test_query_is_singleton() {
        let mut state = QueryState::default();
        state.set_filter("_", FilterMethod::Query, "Foo");
        state.set_filter("title", FilterMethod::Query, "Bar");

        let queries = state.get_filters(None, Some(FilterMethod::Query));
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].values, vec!["Bar".into()]);
    }

    #[test]
    fn test_set_filter_resets_page() {
        let mut state = QueryState::default();
        state.set_params(json!({"page": 4}));
        state.set_filter("genre", FilterMethod::In, ("drama", "comedy"));
        assert_eq!(state.params().page(), Some(1));
    }

    #[test]
    fn test_drop_filters_matching() {
        let mut state = QueryState::default();
        state.set_filter("a", FilterMethod::Eq, 1);
        state.set_filter("a", FilterMethod::Range, (1, 5));
        state.set_filter("b", FilterMethod::Eq, 2);

        state.drop_filters(None, Some(FilterMethod::Eq));
        assert_eq!(state.get_filters(None, None).len(), 1);

        state.set_filter("b", FilterMethod::Eq, 2);
        state.drop_filters(Some("a"), Some(FilterMethod::Eq));
        assert_eq!(state.get_filters(None, None).len(), 2);

        state.drop_filters(Some("a"), None);
        assert_eq!(state.get_filters(None, None), vec![Filter::new("b", FilterMethod::Eq, 2)]);
    }

    #[test]
    fn test_drop_all_keeps_persistent() {
        let mut state = QueryState::default();
        state.set_persistent_filter("tenant", FilterMethod::Eq, 7);
        state.set_persistent_filter("tenant", FilterMethod::Eq, 7);
        state.set_filter("a", FilterMethod::Eq, 1);
        assert!(!state.pristine());

        state.drop_filters(None, None);
        assert!(state.pristine());
        assert_eq!(state.persistent_filters().len(), 2);
        assert!(state.get_filters(Some("tenant"), None).is_empty());
    }

    #[test]
    fn test_get_filter_values() {
        let mut state = QueryState::default();
        state.set_filter("year_of_production", FilterMethod::Range, (1900, 2008));
        state.set_filter("_", FilterMethod::Query, "Foo");

        assert_eq!(
            state.get_filter_values("year_of_production", FilterMethod::Range),
            Some(ExtractedValues::List(vec![1900.into(), 2008.into()]))
        );
        assert_eq!(
            state.get_filter_values("_", FilterMethod::Query),
            Some(ExtractedValues::Single("Foo".into()))
        );
        assert_eq!(state.get_filter_values("missing", FilterMethod::Eq), None);
    }

    #[test]
    fn test_params_null_pruned_and_dropped() {
        let mut state = QueryState::default();
        state.set_params(json!({"per": null, "tag": "x"}));
        assert!(!state.params().contains("per"));
        assert!(state.params().contains("tag"));

        state.drop_params(["tag", "page"]);
        assert!(!state.params().contains("tag"));
        assert!(!state.params().contains("page"));
    }

    #[test]
    fn test_fixed_order_forces_params() {
        let mut state = QueryState::default();
        state.set_params(json!({"page": 3}));
        state.set_fixed_order(vec![json!(3), json!(1), json!(2)]);

        assert_eq!(state.fixed_order().map(<[Value]>::len), Some(3));
        assert_eq!(state.params().sort(), None);
        assert_eq!(state.params().order(), None);
        assert_eq!(state.params().page(), Some(1));
        assert_eq!(state.params().per(), Some(1000));
    }

    #[test]
    fn test_sort_clears_fixed_order() {
        let mut state = QueryState::default();
        state.set_fixed_order(vec![json!(1)]);
        state.set_params(json!({"per": 10}));
        assert!(state.fixed_order().is_some());

        state.set_params(json!({"sort": "title"}));
        assert!(state.fixed_order().is_none());
    }

    #[test]
    fn test_prepare_resets_results() {
        let mut state = QueryState::default();
        let id = state.prepare();
        state
            .reconcile(id, response(vec![json!({"id": 1})]))
            .unwrap();
        assert_eq!(state.total_count(), 3);

        let next = state.prepare();
        assert_eq!(next, id + 1);
        assert!(state.running());
        assert!(state.objects().is_empty());
        assert_eq!(state.total_count(), 0);
        assert_eq!(state.view().per, Some(24));
    }

    #[test]
    fn test_reconcile_applies_fixed_order() {
        let mut state = QueryState::default();
        state.set_fixed_order(vec![json!(3), json!(1), json!(2)]);
        let id = state.prepare();
        state
            .reconcile(id, response(vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})]))
            .unwrap();

        assert_eq!(
            state.objects(),
            &[json!({"id": 3}), json!({"id": 1}), json!({"id": 2})]
        );
        assert!(!state.running());
    }

    #[test]
    fn test_stale_reconcile_is_noop() {
        let mut state = QueryState::default();
        let first = state.prepare();
        let second = state.prepare();

        let err = state.reconcile(first, response(vec![json!({"id": 9})])).unwrap_err();
        assert!(err.is_superseded());
        assert!(state.objects().is_empty());
        assert!(state.running());

        assert!(state.fail(first).unwrap_err().is_superseded());
        assert!(state.running());

        state.fail(second).unwrap();
        assert!(!state.running());
    }

    #[test]
    fn test_build_request_body() {
        let mut state = QueryState::default();
        state.set_persistent_filter("tenant", FilterMethod::Eq, 7);
        state.set_filter("_", FilterMethod::Query, "Foo");
        let stats = json!({"count_by": ["genre"]});
        let request = state.build_request(Some(&stats), Some("movies"));

        assert_eq!(request.body["page"], json!(1));
        assert_eq!(
            request.body["search"]["filters"],
            json!([["tenant", "eq", 7], ["_", "q", "Foo"]])
        );
        assert_eq!(request.body["stats"], stats);
        assert_eq!(request.schema.as_deref(), Some("movies"));

        let bare = state.build_request(None, None);
        assert!(bare.body.get("stats").is_none());
    }

    #[test]
    fn test_get_aggregations() {
        let mut state = QueryState::default();
        let id = state.prepare();
        let mut aggregations = Map::new();
        aggregations.insert("count_by_genre".to_string(), json!([{"key": "drama", "count": 2}]));
        state
            .reconcile(
                id,
                SearchResponse {
                    objects: vec![],
                    aggregations,
                    pagination: Pagination::default(),
                },
            )
            .unwrap();

        assert_eq!(state.get_aggregations("genre"), json!([{"key": "drama", "count": 2}]));
        assert_eq!(state.get_aggregations("year"), json!([]));
    }
}
