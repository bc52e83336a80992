use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalmap_types::{DeviceId, GeoCoordinate, Sample};
use std::collections::BTreeSet;

/// 传输层未提供名称时使用的占位名称
pub const UNKNOWN_DEVICE_NAME: &str = "unknown";

/// 设备记录
///
/// 每个设备 ID 对应一条，由注册表独占写入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// 设备 ID（创建后不变）
    pub id: DeviceId,

    /// 显示名称
    pub display_name: String,

    /// 当前信号强度（dBm）
    pub signal_strength: i32,

    /// 连接并完成服务发现后得到的服务列表
    pub services: BTreeSet<String>,

    /// 广播中携带的服务提示
    pub advertised_services: BTreeSet<String>,

    /// 连接状态
    pub connection: ConnectionState,

    /// 首次发现时间
    pub first_seen: DateTime<Utc>,

    /// 最后一次被接受的更新时间
    pub last_updated: DateTime<Utc>,

    /// 采样序列（按采集时间追加）
    pub samples: Vec<Sample>,
}

impl DeviceRecord {
    /// 由首次发现事件创建记录
    pub fn new(event: &DiscoveryEvent, location: Option<GeoCoordinate>) -> Self {
        let samples = location
            .map(|loc| vec![Sample::new(loc, event.signal_strength, event.timestamp)])
            .unwrap_or_default();

        Self {
            id: event.id,
            display_name: event
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string()),
            signal_strength: event.signal_strength,
            services: BTreeSet::new(),
            advertised_services: event.advertised_services.iter().cloned().collect(),
            connection: ConnectionState::Disconnected,
            first_seen: event.timestamp,
            last_updated: event.timestamp,
            samples,
        }
    }

    /// 名称是否为占位名称
    pub fn is_unknown(&self) -> bool {
        self.display_name == UNKNOWN_DEVICE_NAME
    }

    /// 最近一个采样点
    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// 信号格数（0.0 / 0.25 / 0.5 / 1.0），用于设备卡片
    pub fn signal_level(&self) -> f64 {
        signal_level(self.signal_strength)
    }
}

/// 信号强度 -> 信号格数
pub fn signal_level(signal_strength: i32) -> f64 {
    if signal_strength > -45 {
        1.0
    } else if signal_strength > -60 {
        0.5
    } else if signal_strength > -70 {
        0.25
    } else {
        0.0
    }
}

/// 一次原始发现事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub id: DeviceId,

    /// 广播名称（可能缺失）
    pub name: Option<String>,

    /// 信号强度（dBm）
    pub signal_strength: i32,

    /// 广播中的服务提示
    pub advertised_services: Vec<String>,

    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryEvent {
    pub fn new(id: DeviceId, signal_strength: i32, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            name: None,
            signal_strength,
            advertised_services: Vec::new(),
            timestamp,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.advertised_services = services;
        self
    }
}

/// 设备连接状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    /// 是否正在连接或已连接
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        }
    }
}

/// 蓝牙适配器状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl AdapterState {
    pub fn is_powered_on(&self) -> bool {
        *self == AdapterState::PoweredOn
    }

    /// 面向用户的状态描述
    pub fn status_text(&self) -> &str {
        match self {
            AdapterState::Unknown => "Bluetooth state: unknown",
            AdapterState::Resetting => "Bluetooth state: resetting",
            AdapterState::Unsupported => "Bluetooth unsupported on this device",
            AdapterState::Unauthorized => "Bluetooth unauthorized",
            AdapterState::PoweredOff => "Bluetooth is off",
            AdapterState::PoweredOn => "Bluetooth is on",
        }
    }
}

/// 收藏的设备
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteDevice {
    pub id: DeviceId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl FavoriteDevice {
    pub fn new(id: DeviceId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            created_at: now,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_event_without_location() {
        let event = DiscoveryEvent::new(DeviceId::random(), -80, Utc::now());
        let record = DeviceRecord::new(&event, None);

        assert_eq!(record.display_name, UNKNOWN_DEVICE_NAME);
        assert!(record.is_unknown());
        assert!(record.samples.is_empty());
        assert!(record.services.is_empty());
        assert_eq!(record.connection, ConnectionState::Disconnected);
        assert_eq!(record.first_seen, record.last_updated);
    }

    #[test]
    fn test_record_from_event_with_location() {
        let event = DiscoveryEvent::new(DeviceId::random(), -60, Utc::now())
            .with_name("Tag")
            .with_services(vec!["180F".to_string()]);
        let location = GeoCoordinate::new(40.0, -105.0);
        let record = DeviceRecord::new(&event, Some(location));

        assert_eq!(record.display_name, "Tag");
        assert_eq!(record.samples.len(), 1);
        assert_eq!(record.samples[0].signal_strength, -60);
        assert_eq!(record.samples[0].location, location);
        assert!(record.advertised_services.contains("180F"));
    }

    #[test]
    fn test_signal_level_steps() {
        assert_eq!(signal_level(-40), 1.0);
        assert_eq!(signal_level(-45), 0.5);
        assert_eq!(signal_level(-59), 0.5);
        assert_eq!(signal_level(-60), 0.25);
        assert_eq!(signal_level(-69), 0.25);
        assert_eq!(signal_level(-70), 0.0);
        assert_eq!(signal_level(-95), 0.0);
    }

    #[test]
    fn test_adapter_state_text() {
        assert!(AdapterState::PoweredOn.is_powered_on());
        assert!(!AdapterState::PoweredOff.is_powered_on());
        assert_eq!(AdapterState::PoweredOff.status_text(), "Bluetooth is off");
    }

    #[test]
    fn test_connection_state_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Failed.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }
}
