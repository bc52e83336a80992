use signalmap_types::DeviceId;
use thiserror::Error;

use crate::model::AdapterState;

/// 设备注册表/扫描会话错误类型
///
/// 除 `AdapterNotReady` 和 `SessionClosed` 外都属于可吸收的局部错误：
/// 记录日志后保持原状态，不向上层传播为致命错误。
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 设备未在注册表中
    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// 发现事件到达时没有可用定位
    #[error("No location available for device: {0}")]
    NoLocationAvailable(DeviceId),

    /// 连接失败
    #[error("Connection to {device_id} failed: {reason}")]
    ConnectionFailure { device_id: DeviceId, reason: String },

    /// 服务发现失败
    #[error("Service discovery on {device_id} failed: {reason}")]
    ServiceDiscoveryFailure { device_id: DeviceId, reason: String },

    /// 蓝牙适配器不可用
    #[error("Adapter not ready: {}", .0.status_text())]
    AdapterNotReady(AdapterState),

    /// 会话事件循环已退出
    #[error("Scan session closed")]
    SessionClosed,

    /// 功能未解锁
    #[error("Feature locked: {0}")]
    FeatureLocked(String),

    /// 收藏存储错误
    #[error("Favorite store error: {0}")]
    FavoriteStore(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 设备模块结果类型
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// 创建连接错误
    pub fn connection(device_id: DeviceId, reason: impl Into<String>) -> Self {
        DeviceError::ConnectionFailure {
            device_id,
            reason: reason.into(),
        }
    }

    /// 创建服务发现错误
    pub fn service_discovery(device_id: DeviceId, reason: impl Into<String>) -> Self {
        DeviceError::ServiceDiscoveryFailure {
            device_id,
            reason: reason.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        DeviceError::Internal(msg.into())
    }

    /// 是否为可吸收的局部错误
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            DeviceError::AdapterNotReady(_) | DeviceError::SessionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        let id = DeviceId::random();
        assert!(DeviceError::UnknownDevice(id).is_recoverable());
        assert!(DeviceError::connection(id, "timeout").is_recoverable());
        assert!(DeviceError::FavoriteStore("disk full".to_string()).is_recoverable());

        assert!(!DeviceError::SessionClosed.is_recoverable());
        assert!(!DeviceError::AdapterNotReady(AdapterState::PoweredOff).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let id = DeviceId::random();
        let err = DeviceError::service_discovery(id, "gatt error");
        assert_eq!(
            err.to_string(),
            format!("Service discovery on {} failed: gatt error", id)
        );
        assert_eq!(
            DeviceError::AdapterNotReady(AdapterState::PoweredOff).to_string(),
            "Adapter not ready: Bluetooth is off"
        );
    }
}
