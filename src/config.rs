//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `APPAGENT__*` 覆盖（双下划线表示嵌套，如 `APPAGENT__WEB__PORT=8080`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub web: WebSection,
    #[serde(default)]
    pub jobs: JobsSection,
    #[serde(default)]
    pub log: LogSection,
}

/// [web] 段：控制台监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl WebSection {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// [jobs] 段：脚本位置、解释器、停止宽限期
#[derive(Debug, Clone, Deserialize)]
pub struct JobsSection {
    /// 为空时直接执行脚本
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// 请求未指定 root_dir 时使用
    #[serde(default = "default_root_dir")]
    pub default_root_dir: String,
    /// 发送终止信号后等待多少秒再强制 kill
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_root_dir() -> String {
    "./".to_string()
}

fn default_stop_grace_secs() -> u64 {
    10
}

impl Default for JobsSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            scripts_dir: default_scripts_dir(),
            default_root_dir: default_root_dir(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

/// [log] 段：RUST_LOG 未设置时使用的级别
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 APPAGENT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 APPAGENT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "default"] {
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
        config::Environment::with_prefix("APPAGENT")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
