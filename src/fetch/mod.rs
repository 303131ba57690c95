//! 请求协调层：执行器抽象、位置能力、会话与构建器

pub mod builder;
pub mod executor;
pub mod location;
pub mod session;

pub use builder::SessionBuilder;
pub use executor::{executor_fn, FnExecutor, Pagination, SearchExecutor, SearchRequest, SearchResponse};
pub use location::{Location, MemoryLocation, QueryMap};
pub use session::{SearchSession, SearchSnapshot, UpdateCallback};
