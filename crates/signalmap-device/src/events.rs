use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signalmap_types::{DeviceId, GeoCoordinate};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::warn;

use crate::model::{AdapterState, ConnectionState, DiscoveryEvent};
use crate::{DeviceError, Result};

/// 外部来源推送给扫描会话的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// 发现事件
    Discovered(DiscoveryEvent),

    /// 定位更新
    Location {
        coordinate: GeoCoordinate,
        timestamp: DateTime<Utc>,
    },

    /// 适配器状态变化
    AdapterStateChanged(AdapterState),

    /// 连接成功
    Connected(DeviceId),

    /// 连接失败
    ConnectionFailed { device_id: DeviceId, reason: String },

    /// 服务发现完成
    ServicesDiscovered {
        device_id: DeviceId,
        services: Vec<String>,
    },

    /// 服务发现失败
    ServiceDiscoveryFailed { device_id: DeviceId, reason: String },
}

/// 扫描会话事件循环的输入
pub(crate) enum SessionMessage {
    Event(ScanEvent),
    Start(oneshot::Sender<Result<()>>),
    Stop(oneshot::Sender<()>),
    Connect(DeviceId, oneshot::Sender<bool>),
    ClearSamples(DeviceId, oneshot::Sender<bool>),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// 事件入口
///
/// 发现源、定位源和连接任务通过它把事件排入会话的单消费者队列。
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<SessionMessage>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<SessionMessage>) -> Self {
        Self { tx }
    }

    /// 排入事件，队列满时等待
    pub async fn send(&self, event: ScanEvent) -> Result<()> {
        self.tx
            .send(SessionMessage::Event(event))
            .await
            .map_err(|_| DeviceError::SessionClosed)
    }

    /// 非阻塞排入事件，队列满时丢弃并记录告警
    pub fn try_send(&self, event: ScanEvent) -> Result<()> {
        match self.tx.try_send(SessionMessage::Event(event)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Scan event queue full, event dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeviceError::SessionClosed),
        }
    }

    pub async fn discovered(&self, event: DiscoveryEvent) -> Result<()> {
        self.send(ScanEvent::Discovered(event)).await
    }

    pub async fn location(&self, coordinate: GeoCoordinate, timestamp: DateTime<Utc>) -> Result<()> {
        self.send(ScanEvent::Location {
            coordinate,
            timestamp,
        })
        .await
    }

    pub async fn adapter_state(&self, state: AdapterState) -> Result<()> {
        self.send(ScanEvent::AdapterStateChanged(state)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 注册表变更通知
///
/// 只携带设备 ID，订阅者收到后自行读取快照。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegistryEvent {
    SessionStarted,
    SessionStopped,
    DeviceAdded(DeviceId),
    DeviceUpdated(DeviceId),
    SamplesCleared(DeviceId),
    ConnectionChanged {
        device_id: DeviceId,
        state: ConnectionState,
    },
    ServicesUpdated(DeviceId),
}

/// 变更通知总线
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// 发布通知，返回收到的订阅者数量（没有订阅者时为 0）
    pub fn publish(&self, event: RegistryEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_eventbus_publish_subscribe() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = DeviceId::random();

        assert_eq!(bus.publish(RegistryEvent::DeviceAdded(id)), 1);

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Failed to receive event");
        assert_eq!(received, RegistryEvent::DeviceAdded(id));
    }

    #[tokio::test]
    async fn test_eventbus_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(RegistryEvent::SessionStarted), 0);
    }

    #[tokio::test]
    async fn test_sink_reports_closed_session() {
        let (tx, rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        let result = sink.adapter_state(AdapterState::PoweredOn).await;
        assert!(matches!(result, Err(DeviceError::SessionClosed)));
        assert!(matches!(
            sink.try_send(ScanEvent::Connected(DeviceId::random())),
            Err(DeviceError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_try_send_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        let id = DeviceId::random();

        sink.try_send(ScanEvent::Connected(id)).unwrap();
        // 队列已满，丢弃但不报错
        sink.try_send(ScanEvent::Connected(id)).unwrap();

        assert!(matches!(rx.recv().await, Some(SessionMessage::Event(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_registry_event_serialization() {
        let id = DeviceId::random();
        let event = RegistryEvent::ConnectionChanged {
            device_id: id,
            state: ConnectionState::Connected,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["ConnectionChanged"]["state"], "Connected");
        assert_eq!(
            value["ConnectionChanged"]["device_id"],
            id.to_string().as_str()
        );

        let back: RegistryEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
