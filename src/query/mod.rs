//! 状态存储层：过滤条件、参数、查询状态与状态令牌（无 I/O）

pub mod filter;
pub mod params;
pub mod state;
pub mod token;

pub use filter::{ExtractedValues, Filter, FilterMethod, FilterValue, FilterValues};
pub use params::{ParamPatch, Params};
pub use state::{aggregation_key, apply_fixed_order, QueryState, ResultView};
pub use token::StatePatch;
