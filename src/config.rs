//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WONDER__*` 覆盖（双下划线表示嵌套，如 `WONDER__BACKEND__OFFLINE=true`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::models::Environment;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub backend: BackendSection,
    pub documents: DocumentsSection,
    pub request: RequestDefaults,
}

/// [app] 段：应用名（同时是设置文件名）、数据目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_app_name() -> String {
    "wonder-harness".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl AppSection {
    /// 持久化设置文件：<data_dir>/<name>.json
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.json", self.name))
    }
}

/// [backend] 段：各环境的边缘 API 地址、超时、离线模式
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// true 时使用 Mock 后端，不发任何网络请求
    #[serde(default)]
    pub offline: bool,
    /// 环境名 -> base URL（local / development / production）
    #[serde(default = "default_environments")]
    pub environments: HashMap<String, String>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            offline: false,
            environments: default_environments(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_environments() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("local".to_string(), "http://127.0.0.1:8787".to_string());
    map
}

impl BackendSection {
    /// 解析为环境枚举 -> URL；未知环境名忽略并告警
    pub fn endpoints(&self) -> HashMap<Environment, String> {
        self.environments
            .iter()
            .filter_map(|(name, url)| match name.parse::<Environment>() {
                Ok(env) => Some((env, url.clone())),
                Err(_) => {
                    tracing::warn!(environment = %name, "Ignoring unknown environment in config");
                    None
                }
            })
            .collect()
    }
}

/// [documents] 段：文档存储地址与付款单集合
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsSection {
    pub base_url: Option<String>,
    #[serde(default = "default_purchase_orders_collection")]
    pub purchase_orders_collection: String,
    /// 付款单文档中存放剧本改动（JSON 字符串）的字段
    #[serde(default = "default_changes_field")]
    pub changes_field: String,
}

impl Default for DocumentsSection {
    fn default() -> Self {
        Self {
            base_url: None,
            purchase_orders_collection: default_purchase_orders_collection(),
            changes_field: default_changes_field(),
        }
    }
}

fn default_purchase_orders_collection() -> String {
    "purchase_orders".to_string()
}

fn default_changes_field() -> String {
    "data".to_string()
}

/// [request] 段：命令行测试台的默认寻址字段
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestDefaults {
    #[serde(default)]
    pub root_element_id: String,
    #[serde(default)]
    pub element_id: String,
    #[serde(default)]
    pub user_id: String,
}

/// 从 config 目录加载配置，环境变量 WONDER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WONDER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
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
        config::Environment::with_prefix("WONDER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
