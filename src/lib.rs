//! Sift - 有状态的搜索查询构建器
//!
//! 模块划分：
//! - **config**: 会话配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **query**: 状态存储（过滤条件、参数、固定排序、状态令牌），无 I/O
//! - **fetch**: 请求协调（执行器抽象、请求代际淘汰、结果对账、URL 持久化）
//! - **observability**: 日志初始化

pub mod config;
pub mod core;
pub mod fetch;
pub mod observability;
pub mod query;

pub use crate::core::SearchError;
pub use fetch::{executor_fn, SearchExecutor, SearchRequest, SearchResponse, SearchSession, SearchSnapshot, SessionBuilder};
pub use query::{ExtractedValues, Filter, FilterMethod, FilterValue, ParamPatch};
