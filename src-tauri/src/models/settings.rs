//! # 后端托管配置
//!
//! 定义计算服务的启动与通信参数（`BackendSettings`），
//! 存储在应用配置目录下的 `backend-config.json`。
//!
//! 配置文件不存在时使用默认值；文件损坏时记录警告并回退到默认值，
//! 不会因为配置问题阻止应用启动。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 配置文件名
pub const BACKEND_CONFIG_FILE: &str = "backend-config.json";

/// 计算服务启动与通信参数
///
/// 对应 `backend-config.json`：
/// ```json
/// { "host": "127.0.0.1", "port": 5000, "launchTimeoutSecs": 60 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// 计算服务监听地址
    pub host: String,
    pub port: u16,

    /// 等待就绪信号的最长时间
    pub launch_timeout_secs: u64,

    /// 无法读取日志时（降级启动策略）固定等待的时间
    pub grace_delay_secs: u64,

    /// 停止时等待进程自行退出的时间，超时后强制结束
    pub stop_grace_secs: u64,

    /// 普通网关请求超时
    pub request_timeout_secs: u64,

    /// 生成 / 变体请求超时（推理耗时较长）
    pub generation_timeout_secs: u64,

    /// 日志级别：error / warn / info / debug / trace
    pub log_level: String,

    /// 覆盖默认的就绪信号正则
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_pattern: Option<String>,

    /// 覆盖计算服务可执行文件
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_program: Option<String>,

    /// 覆盖启动参数（仅在 `backend_program` 设置时生效）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_args: Option<Vec<String>>,

    /// 覆盖工作目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_dir: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            launch_timeout_secs: 60,
            grace_delay_secs: 3,
            stop_grace_secs: 5,
            request_timeout_secs: 30,
            generation_timeout_secs: 900,
            log_level: "info".to_string(),
            readiness_pattern: None,
            backend_program: None,
            backend_args: None,
            backend_dir: None,
        }
    }
}

impl BackendSettings {
    /// 从配置文件加载，文件不存在时使用默认值
    ///
    /// 读取或解析失败时返回错误信息，由调用方决定回退方式。加载发生在日志插件注册之前，
    /// 这里不直接写日志，否则警告会丢失。
    pub async fn try_load(path: &Path) -> Result<Self, String> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("读取 {} 失败: {}", path.display(), e)),
        };
        serde_json::from_str(&content).map_err(|e| format!("解析 {} 失败: {}", path.display(), e))
    }

    /// 计算服务根地址，如 `http://127.0.0.1:5000`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_secs(self.grace_delay_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// 解析日志级别，无法识别时使用 Info
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BackendSettings::try_load(&dir.path().join(BACKEND_CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.base_url(), "http://127.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BACKEND_CONFIG_FILE);
        std::fs::write(&path, r#"{ "port": 5055, "logLevel": "debug" }"#).unwrap();

        let settings = BackendSettings::try_load(&path).await.unwrap();
        assert_eq!(settings.port, 5055);
        assert_eq!(settings.level_filter(), log::LevelFilter::Debug);
        assert_eq!(settings.launch_timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_malformed_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BACKEND_CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = BackendSettings::try_load(&path).await.unwrap_err();
        assert!(err.contains(BACKEND_CONFIG_FILE), "{}", err);
        let settings = BackendSettings::try_load(&path).await.unwrap_or_default();
        assert_eq!(settings.port, 5000);
    }
}
