use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::geo::GeoCoordinate;

/// 设备标识（传输层提供的 128 位不透明 ID）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// 生成随机 ID（模拟器和测试使用）
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// 短格式，用于日志和列表展示
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl From<Uuid> for DeviceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for DeviceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// 信号采样点
///
/// 一次 (位置, 信号强度) 观测，创建后不可变，归属于所在设备记录的采样序列。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// 采样位置
    pub location: GeoCoordinate,

    /// 采样时的信号强度（dBm）
    pub signal_strength: i32,

    /// 采样时间
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(location: GeoCoordinate, signal_strength: i32, captured_at: DateTime<Utc>) -> Self {
        Self {
            location,
            signal_strength,
            captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_parse_and_display() {
        let raw = "6f1c2d3e-4a5b-4c6d-8e7f-90a1b2c3d4e5";
        let id: DeviceId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert_eq!(id.short(), "6f1c2d3e");
    }

    #[test]
    fn test_device_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_device_id_serializes_as_plain_string() {
        let id = DeviceId::random();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
