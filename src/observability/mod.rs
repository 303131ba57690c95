//! 可观测性

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 安装日志订阅者：默认 info，可通过 RUST_LOG 覆盖（如 `RUST_LOG=sift=debug`）
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
