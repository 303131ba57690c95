//! 搜索会话错误类型
//!
//! Superseded 不是失败：它表示请求已被更新的 fire 取代，调用方应静默忽略。

use thiserror::Error;

/// 执行器返回的失败信息（与 crate 内其它异步 trait 一致，错误以字符串携带）
pub type ExecutorError = String;

/// 搜索会话可能产生的错误
#[derive(Error, Debug)]
pub enum SearchError {
    /// 构建会话时未提供执行器
    #[error("Executor is required")]
    MissingExecutor,

    #[error("Executor failed: {0}")]
    Executor(ExecutorError),

    /// 响应返回时已有更新的请求发出，结果被丢弃
    #[error("Request {request_id} superseded by {latest}")]
    Superseded { request_id: u64, latest: u64 },

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SearchError {
    /// 是否为「被取代」状态（非真正失败，无需上报）
    pub fn is_superseded(&self) -> bool {
        matches!(self, SearchError::Superseded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superseded_is_distinct_from_failure() {
        let stale = SearchError::Superseded { request_id: 1, latest: 2 };
        assert!(stale.is_superseded());
        assert!(!SearchError::Executor("boom".to_string()).is_superseded());
        assert!(!SearchError::MissingExecutor.is_superseded());
    }

    #[test]
    fn test_error_messages() {
        let err = SearchError::Superseded { request_id: 3, latest: 5 };
        assert_eq!(err.to_string(), "Request 3 superseded by 5");
        assert_eq!(
            SearchError::Executor("timeout".to_string()).to_string(),
            "Executor failed: timeout"
        );
    }
}
