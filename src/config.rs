//! 会话配置：从 config/sift.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SIFT__*` 覆盖（双下划线表示嵌套，如 `SIFT__DEFAULTS__PER=48`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 配置根（对应 config/sift.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub defaults: DefaultsSection,
    pub fixed_order: FixedOrderSection,
    pub location: LocationSection,
}

/// [defaults] 段：新会话的初始参数
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per")]
    pub per: u64,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_order")]
    pub order: String,
}

fn default_page() -> u64 {
    1
}

fn default_per() -> u64 {
    24
}

fn default_sort() -> String {
    "created_at".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            page: default_page(),
            per: default_per(),
            sort: default_sort(),
            order: default_order(),
        }
    }
}

/// [fixed_order] 段：固定排序时一次取回的条数（需覆盖整个 id 列表）
#[derive(Debug, Clone, Deserialize)]
pub struct FixedOrderSection {
    #[serde(default = "default_fixed_order_per")]
    pub per: u64,
}

fn default_fixed_order_per() -> u64 {
    1000
}

impl Default for FixedOrderSection {
    fn default() -> Self {
        Self {
            per: default_fixed_order_per(),
        }
    }
}

/// [location] 段：状态令牌写入的查询串参数名
#[derive(Debug, Clone, Deserialize)]
pub struct LocationSection {
    #[serde(default = "default_location_param")]
    pub param: String,
}

fn default_location_param() -> String {
    "p".to_string()
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            param: default_location_param(),
        }
    }
}

/// 加载配置，环境变量 SIFT__* 可覆盖
///
/// 1. 按顺序查找 config/sift.toml、sift.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SIFT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<SiftConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/sift", "sift"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SIFT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
