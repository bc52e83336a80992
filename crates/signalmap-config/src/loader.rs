use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::SignalMapConfig;

/// 配置文件名
const CONFIG_FILE: &str = "signalmap.toml";

/// 环境变量前缀，例如 `SIGNALMAP_SCANNER__THROTTLE_MS=500`
const ENV_PREFIX: &str = "SIGNALMAP";

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// 配置文件路径
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// 加载配置
    ///
    /// 文件不存在时使用默认值；环境变量覆盖文件中的同名项。
    pub fn load(&self) -> Result<SignalMapConfig> {
        let config_path = self.config_path();

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 加载并校验
    pub fn load_validated(&self) -> Result<SignalMapConfig> {
        let config = self.load()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(config: &SignalMapConfig) -> Result<()> {
        let scanner = &config.scanner;
        if scanner.throttle_ms == 0 {
            return Err(anyhow!("scanner.throttle_ms must be greater than 0"));
        }
        if scanner.min_signal_delta < 0 {
            return Err(anyhow!(
                "scanner.min_signal_delta ({}) cannot be negative",
                scanner.min_signal_delta
            ));
        }
        if !(scanner.min_sample_distance_m.is_finite() && scanner.min_sample_distance_m >= 0.0) {
            return Err(anyhow!(
                "scanner.min_sample_distance_m ({}) must be a non-negative number",
                scanner.min_sample_distance_m
            ));
        }
        if scanner.event_queue_capacity == 0 {
            return Err(anyhow!("scanner.event_queue_capacity must be greater than 0"));
        }
        if scanner.notify_capacity == 0 {
            return Err(anyhow!("scanner.notify_capacity must be greater than 0"));
        }

        let heatmap = &config.heatmap;
        if !(heatmap.resolution_m.is_finite() && heatmap.resolution_m > 0.0) {
            return Err(anyhow!(
                "heatmap.resolution_m ({}) must be greater than 0",
                heatmap.resolution_m
            ));
        }
        if !(heatmap.padding_cells.is_finite() && heatmap.padding_cells >= 0.0) {
            return Err(anyhow!(
                "heatmap.padding_cells ({}) cannot be negative",
                heatmap.padding_cells
            ));
        }
        if heatmap.max_cells == 0 {
            return Err(anyhow!("heatmap.max_cells must be greater than 0"));
        }

        config.logging.level_filter()?;

        Ok(())
    }

    /// 写出默认配置文件（已存在时不覆盖）
    pub fn write_default(&self) -> Result<PathBuf> {
        let path = self.config_path();
        if path.exists() {
            return Ok(path);
        }
        std::fs::create_dir_all(&self.config_dir)?;
        let content = toml::to_string_pretty(&SignalMapConfig::default())?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
