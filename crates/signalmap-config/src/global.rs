use serde::{Deserialize, Serialize};
use signalmap_logging::LoggingConfig;

/// 全局配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalMapConfig {
    pub scanner: ScannerConfig,
    pub heatmap: HeatmapConfig,
    pub logging: LoggingConfig,
}

/// 扫描/注册表配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// 同一设备两次更新之间的最小间隔（毫秒）
    pub throttle_ms: u64,

    /// 信号强度变化小于该值时不更新（dB）
    pub min_signal_delta: i32,

    /// 与上一个采样点距离小于该值时不追加采样（米）
    pub min_sample_distance_m: f64,

    /// 事件队列容量
    pub event_queue_capacity: usize,

    /// 变更通知通道容量
    pub notify_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 1000,
            min_signal_delta: 2,
            min_sample_distance_m: 1.0,
            event_queue_capacity: 1024,
            notify_capacity: 256,
        }
    }
}

/// 热力图配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// 网格边长（米）
    pub resolution_m: f64,

    /// 包围盒留白（网格数）
    pub padding_cells: f64,

    /// 单次构建的网格数上限
    pub max_cells: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            resolution_m: 1.0,
            padding_cells: 2.0,
            max_cells: 250_000,
        }
    }
}
