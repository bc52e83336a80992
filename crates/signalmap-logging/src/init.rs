use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Failed to initialize logging: {0}")]
    InitError(String),
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读
    #[default]
    Pretty,
    /// 每行一个 JSON 对象
    Json,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认级别（trace/debug/info/warn/error/off），RUST_LOG 优先
    pub level: String,

    /// 输出格式
    pub format: LogFormat,

    /// 是否输出 target（模块路径）
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// 解析配置的日志级别
    pub fn level_filter(&self) -> Result<LevelFilter, LoggingError> {
        self.level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| LoggingError::InvalidLevel(self.level.clone()))
    }

    /// 构建过滤器：存在 RUST_LOG 时使用环境变量，否则使用配置级别
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let level = self.level_filter()?;
        Ok(EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy())
    }
}

/// 初始化全局 tracing subscriber
///
/// 每个进程只能成功调用一次，重复初始化返回 `InitError`。
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))?;

    debug!(
        level = %config.level,
        format = ?config.format,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level_filter().unwrap(), LevelFilter::INFO);
    }

    #[test]
    fn test_level_parsing() {
        let mut config = LoggingConfig::default();
        config.level = "DEBUG".to_string();
        assert_eq!(config.level_filter().unwrap(), LevelFilter::DEBUG);

        config.level = "loud".to_string();
        assert!(matches!(
            config.level_filter(),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_format_deserialize() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level": "warn", "format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_target);

        assert!(serde_json::from_str::<LoggingConfig>(r#"{"format": "xml"}"#).is_err());
    }

    #[test]
    fn test_init_twice_fails() {
        let config = LoggingConfig::default();
        // 第一次可能因其他测试已初始化而失败，第二次必定失败
        let _ = init_logging(&config);
        assert!(tracing::dispatcher::has_been_set());
        assert!(init_logging(&config).is_err());
    }
}
