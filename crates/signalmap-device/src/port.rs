use async_trait::async_trait;
use signalmap_types::DeviceId;

use crate::events::EventSink;
use crate::model::AdapterState;
use crate::Result;

/// 发现源（系统无线扫描接口的抽象）
///
/// 扫描期间通过 `EventSink` 推送发现事件、适配器状态变化以及连接生命周期回调。
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// 当前适配器状态
    async fn adapter_state(&self) -> AdapterState;

    /// 开始扫描（允许重复上报同一设备）
    ///
    /// 在会话事件循环中调用，实现不能在此处等待队列腾出空间。
    async fn start_scanning(&self, sink: EventSink) -> Result<()>;

    /// 停止扫描
    async fn stop_scanning(&self) -> Result<()>;
}

/// 定位源（系统定位接口的抽象）
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// 是否已获得定位授权
    async fn is_authorized(&self) -> bool;

    /// 请求授权
    async fn request_authorization(&self) -> Result<()>;

    /// 开始推送定位
    async fn start_updating(&self, sink: EventSink) -> Result<()>;
}

/// 连接能力
///
/// 两个独立的 future，由会话组合；核心只记录它们的结果，不设超时也不重试。
#[async_trait]
pub trait Connector: Send + Sync {
    /// 建立连接
    async fn connect(&self, device_id: DeviceId) -> Result<()>;

    /// 枚举服务
    async fn discover_services(&self, device_id: DeviceId) -> Result<Vec<String>>;
}
