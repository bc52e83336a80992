use chrono::{DateTime, Utc};
use signalmap_config::SignalMapConfig;
use signalmap_heatmap::{build_cells, GridCell, HeatmapOptions};
use signalmap_types::{DeviceId, GeoCoordinate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{EventBus, EventSink, RegistryEvent, ScanEvent, SessionMessage};
use crate::favorites::Favorites;
use crate::listing::{DeviceListing, ListingFilter};
use crate::model::{AdapterState, ConnectionState, DeviceRecord};
use crate::port::{Connector, DiscoverySource, LocationSource};
use crate::registry::{DeviceRegistry, RegistryPolicy, UpdateOutcome};
use crate::{DeviceError, Result};

/// 会话状态（只由事件循环写入）
#[derive(Debug, Clone, Default)]
struct SessionStatus {
    scanning: bool,
    adapter: AdapterState,
    location: Option<GeoCoordinate>,
    location_at: Option<DateTime<Utc>>,
}

/// 扫描会话
///
/// 持有设备注册表，并在一个后台任务中串行处理所有事件：发现源和定位源的推送、
/// 连接回调以及 `start`/`stop`/`connect`/`clear_samples` 等控制命令。
/// 读操作直接读取注册表快照，不经过事件队列。
pub struct ScanSession {
    tx: mpsc::Sender<SessionMessage>,
    registry: Arc<RwLock<DeviceRegistry>>,
    status: Arc<RwLock<SessionStatus>>,
    bus: EventBus,
    heatmap: HeatmapOptions,
    worker: Option<JoinHandle<()>>,
}

impl ScanSession {
    /// 创建扫描会话并启动事件循环
    ///
    /// 定位未授权时先请求授权；授权失败不影响会话，只是不会产生采样。
    pub async fn new(
        config: &SignalMapConfig,
        discovery: Arc<dyn DiscoverySource>,
        location: Arc<dyn LocationSource>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let scanner = &config.scanner;
        if scanner.event_queue_capacity == 0 {
            return Err(DeviceError::internal("event queue capacity must be positive"));
        }

        let (tx, rx) = mpsc::channel(scanner.event_queue_capacity);
        let sink = EventSink::new(tx.clone());
        let registry = Arc::new(RwLock::new(DeviceRegistry::new(RegistryPolicy::from(
            scanner,
        ))));
        let status = Arc::new(RwLock::new(SessionStatus {
            adapter: discovery.adapter_state().await,
            ..Default::default()
        }));
        let bus = EventBus::new(scanner.notify_capacity);

        start_location_updates(location.as_ref(), &sink).await;

        let worker = SessionWorker {
            rx,
            sink,
            registry: registry.clone(),
            status: status.clone(),
            bus: bus.clone(),
            discovery,
            connector,
        };
        let handle = tokio::spawn(worker.run());

        info!(
            throttle_ms = scanner.throttle_ms,
            queue_capacity = scanner.event_queue_capacity,
            "Scan session created"
        );

        Ok(Self {
            tx,
            registry,
            status,
            bus,
            heatmap: HeatmapOptions {
                resolution_m: config.heatmap.resolution_m,
                padding_cells: config.heatmap.padding_cells,
                max_cells: config.heatmap.max_cells,
            },
            worker: Some(handle),
        })
    }

    /// 事件入口，交给外部来源推送事件
    pub fn sink(&self) -> EventSink {
        EventSink::new(self.tx.clone())
    }

    /// 订阅注册表变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.bus.subscribe()
    }

    /// 开始扫描
    ///
    /// 清空注册表后开始接收发现事件。适配器未开启时返回 `AdapterNotReady`。
    pub async fn start(&self) -> Result<()> {
        self.request(SessionMessage::Start).await?
    }

    /// 停止扫描，保留已有记录
    pub async fn stop(&self) -> Result<()> {
        self.request(SessionMessage::Stop).await
    }

    /// 请求连接设备，返回是否发起了新的连接
    ///
    /// 未知设备或已在连接中/已连接时不做任何事。连接和服务发现在后台完成，
    /// 结果通过 `RegistryEvent::ConnectionChanged` / `ServicesUpdated` 通知。
    pub async fn connect(&self, device_id: DeviceId) -> bool {
        self.request(|ack| SessionMessage::Connect(device_id, ack))
            .await
            .unwrap_or_else(|e| {
                warn!(device_id = %device_id, error = %e, "Connect request dropped");
                false
            })
    }

    /// 清空设备的采样序列，返回设备是否存在
    pub async fn clear_samples(&self, device_id: DeviceId) -> bool {
        self.request(|ack| SessionMessage::ClearSamples(device_id, ack))
            .await
            .unwrap_or_else(|e| {
                warn!(device_id = %device_id, error = %e, "Clear samples request dropped");
                false
            })
    }

    /// 等待此前排入队列的消息全部处理完
    pub async fn flush(&self) -> Result<()> {
        self.request(SessionMessage::Flush).await
    }

    /// 关闭会话并等待事件循环退出
    pub async fn shutdown(mut self) -> Result<()> {
        self.tx
            .send(SessionMessage::Shutdown)
            .await
            .map_err(|_| DeviceError::SessionClosed)?;
        if let Some(worker) = self.worker.take() {
            worker
                .await
                .map_err(|e| DeviceError::internal(format!("session worker failed: {}", e)))?;
        }
        Ok(())
    }

    // ========== 查询 ==========

    /// 获取单个设备记录的副本
    pub async fn device(&self, device_id: &DeviceId) -> Option<DeviceRecord> {
        self.registry.read().await.get(device_id).cloned()
    }

    /// 全部设备记录的快照
    pub async fn devices(&self) -> HashMap<DeviceId, DeviceRecord> {
        self.registry.read().await.snapshot()
    }

    pub async fn device_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn is_scanning(&self) -> bool {
        self.status.read().await.scanning
    }

    pub async fn adapter_state(&self) -> AdapterState {
        self.status.read().await.adapter
    }

    /// 最近一次定位
    pub async fn current_location(&self) -> Option<GeoCoordinate> {
        self.status.read().await.location
    }

    /// 最近一次定位的时间
    pub async fn location_updated_at(&self) -> Option<DateTime<Utc>> {
        self.status.read().await.location_at
    }

    /// 为设备构建热力图网格
    ///
    /// 只在读锁内复制采样序列，网格计算在锁外进行。未知设备返回空列表。
    pub async fn build_heatmap_cells(&self, device_id: &DeviceId, resolution_m: f64) -> Vec<GridCell> {
        let samples = match self.registry.read().await.get(device_id) {
            Some(record) => record.samples.clone(),
            None => {
                warn!(device_id = %device_id, "Heatmap requested for unknown device");
                return Vec::new();
            }
        };

        let options = HeatmapOptions {
            resolution_m,
            ..self.heatmap
        };
        let cells = build_cells(&samples, &options);
        debug!(
            device_id = %device_id,
            samples = samples.len(),
            cells = cells.len(),
            "Heatmap built"
        );
        cells
    }

    /// 使用配置的默认分辨率构建热力图
    pub async fn build_heatmap(&self, device_id: &DeviceId) -> Vec<GridCell> {
        self.build_heatmap_cells(device_id, self.heatmap.resolution_m)
            .await
    }

    /// 当前设备列表（收藏 + 附近）
    pub async fn listing(&self, favorites: &Favorites, filter: ListingFilter) -> Result<DeviceListing> {
        let saved = favorites.list().await?;
        let devices = self.registry.read().await.snapshot().into_values();
        DeviceListing::build(devices, &saved, &filter, favorites.entitlement())
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T> {
        let (ack, reply) = oneshot::channel();
        self.tx
            .send(message(ack))
            .await
            .map_err(|_| DeviceError::SessionClosed)?;
        reply.await.map_err(|_| DeviceError::SessionClosed)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if self.tx.try_send(SessionMessage::Shutdown).is_err() {
                worker.abort();
            }
        }
    }
}

async fn start_location_updates(location: &dyn LocationSource, sink: &EventSink) {
    if !location.is_authorized().await {
        if let Err(e) = location.request_authorization().await {
            warn!(error = %e, "Location authorization request failed");
        }
    }

    if !location.is_authorized().await {
        warn!("Location not authorized, no samples will be recorded");
        return;
    }

    match location.start_updating(sink.clone()).await {
        Ok(()) => info!("Location updates started"),
        Err(e) => warn!(error = %e, "Failed to start location updates"),
    }
}

/// 事件循环：注册表的唯一写入者
struct SessionWorker {
    rx: mpsc::Receiver<SessionMessage>,
    sink: EventSink,
    registry: Arc<RwLock<DeviceRegistry>>,
    status: Arc<RwLock<SessionStatus>>,
    bus: EventBus,
    discovery: Arc<dyn DiscoverySource>,
    connector: Arc<dyn Connector>,
}

impl SessionWorker {
    async fn run(mut self) {
        debug!("Scan session worker started");

        while let Some(message) = self.rx.recv().await {
            match message {
                SessionMessage::Event(event) => self.handle_event(event).await,
                SessionMessage::Start(ack) => {
                    let _ = ack.send(self.start().await);
                }
                SessionMessage::Stop(ack) => {
                    self.stop().await;
                    let _ = ack.send(());
                }
                SessionMessage::Connect(device_id, ack) => {
                    let _ = ack.send(self.connect(device_id).await);
                }
                SessionMessage::ClearSamples(device_id, ack) => {
                    let _ = ack.send(self.clear_samples(device_id).await);
                }
                SessionMessage::Flush(ack) => {
                    let _ = ack.send(());
                }
                SessionMessage::Shutdown => break,
            }
        }

        self.stop().await;
        info!("Scan session closed");
    }

    async fn start(&mut self) -> Result<()> {
        let adapter = self.discovery.adapter_state().await;
        self.status.write().await.adapter = adapter;
        if !adapter.is_powered_on() {
            warn!(adapter = %adapter.status_text(), "Cannot start scan, adapter not ready");
            return Err(DeviceError::AdapterNotReady(adapter));
        }

        self.registry.write().await.reset();
        self.status.write().await.scanning = true;

        if let Err(e) = self.discovery.start_scanning(self.sink.clone()).await {
            self.status.write().await.scanning = false;
            warn!(error = %e, "Failed to start scanning");
            return Err(e);
        }

        info!("Scan session started");
        self.bus.publish(RegistryEvent::SessionStarted);
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.status.read().await.scanning {
            debug!("Scan session not running");
            return;
        }

        if let Err(e) = self.discovery.stop_scanning().await {
            warn!(error = %e, "Failed to stop scanning");
        }
        self.status.write().await.scanning = false;

        let devices = self.registry.read().await.len();
        info!(devices = devices, "Scan session stopped");
        self.bus.publish(RegistryEvent::SessionStopped);
    }

    async fn connect(&mut self, device_id: DeviceId) -> bool {
        {
            let mut registry = self.registry.write().await;
            let Some(record) = registry.get(&device_id) else {
                warn!(device_id = %device_id, "Connect requested for unknown device");
                return false;
            };
            if record.connection.is_active() {
                debug!(
                    device_id = %device_id,
                    state = record.connection.as_str(),
                    "Connection already in progress"
                );
                return false;
            }
            if let Err(e) = registry.set_connection_state(&device_id, ConnectionState::Connecting) {
                warn!(device_id = %device_id, error = %e, "Failed to mark device connecting");
                return false;
            }
        }

        info!(device_id = %device_id, "Connecting to device");
        self.publish_connection(device_id, ConnectionState::Connecting);

        let connector = self.connector.clone();
        let sink = self.sink.clone();
        tokio::spawn(connect_and_discover(connector, sink, device_id));
        true
    }

    async fn clear_samples(&mut self, device_id: DeviceId) -> bool {
        match self.registry.write().await.clear_samples(&device_id) {
            Ok(_) => {
                self.bus.publish(RegistryEvent::SamplesCleared(device_id));
                true
            }
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Cannot clear samples");
                false
            }
        }
    }

    async fn handle_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Discovered(event) => {
                if !self.status.read().await.scanning {
                    debug!(device_id = %event.id, "Discovery event ignored, not scanning");
                    return;
                }

                let device_id = event.id;
                let location = self.status.read().await.location;
                let outcome = self.registry.write().await.on_discovered(event, location);

                match outcome {
                    UpdateOutcome::Created { .. } => {
                        self.bus.publish(RegistryEvent::DeviceAdded(device_id));
                    }
                    UpdateOutcome::Updated {
                        location_missing, ..
                    } => {
                        if location_missing {
                            debug!(
                                error = %DeviceError::NoLocationAvailable(device_id),
                                "Sample withheld"
                            );
                        }
                        self.bus.publish(RegistryEvent::DeviceUpdated(device_id));
                    }
                    UpdateOutcome::Throttled => {}
                }
            }

            ScanEvent::Location {
                coordinate,
                timestamp,
            } => {
                let mut status = self.status.write().await;
                status.location = Some(coordinate);
                status.location_at = Some(timestamp);
            }

            ScanEvent::AdapterStateChanged(state) => {
                let was_scanning = {
                    let mut status = self.status.write().await;
                    status.adapter = state;
                    status.scanning
                };
                info!(adapter = %state.status_text(), "Adapter state changed");

                if was_scanning && !state.is_powered_on() {
                    warn!("Adapter no longer powered on, stopping scan");
                    self.stop().await;
                }
            }

            ScanEvent::Connected(device_id) => {
                info!(device_id = %device_id, "Device connected");
                self.update_connection(device_id, ConnectionState::Connected)
                    .await;
            }

            ScanEvent::ConnectionFailed { device_id, reason } => {
                warn!(
                    error = %DeviceError::connection(device_id, reason),
                    "Connection attempt failed"
                );
                self.update_connection(device_id, ConnectionState::Failed)
                    .await;
            }

            ScanEvent::ServicesDiscovered {
                device_id,
                services,
            } => {
                let count = services.len();
                let result = self
                    .registry
                    .write()
                    .await
                    .on_services_discovered(&device_id, services);
                match result {
                    Ok(()) => {
                        info!(device_id = %device_id, services = count, "Services discovered");
                        self.bus.publish(RegistryEvent::ServicesUpdated(device_id));
                    }
                    Err(e) => warn!(error = %e, "Services discovered for unknown device"),
                }
            }

            ScanEvent::ServiceDiscoveryFailed { device_id, reason } => {
                warn!(
                    error = %DeviceError::service_discovery(device_id, reason),
                    "Service discovery failed"
                );
                self.update_connection(device_id, ConnectionState::Failed)
                    .await;
            }
        }
    }

    async fn update_connection(&mut self, device_id: DeviceId, state: ConnectionState) {
        let result = self
            .registry
            .write()
            .await
            .set_connection_state(&device_id, state);
        match result {
            Ok(()) => self.publish_connection(device_id, state),
            Err(e) => warn!(error = %e, state = state.as_str(), "Connection update dropped"),
        }
    }

    fn publish_connection(&self, device_id: DeviceId, state: ConnectionState) {
        self.bus
            .publish(RegistryEvent::ConnectionChanged { device_id, state });
    }
}

/// 连接并枚举服务，结果排回会话队列
///
/// 不设超时也不重试；会话关闭后结果被丢弃。
async fn connect_and_discover(connector: Arc<dyn Connector>, sink: EventSink, device_id: DeviceId) {
    let event = match connector.connect(device_id).await {
        Ok(()) => {
            if sink.send(ScanEvent::Connected(device_id)).await.is_err() {
                debug!(device_id = %device_id, "Session closed during connect");
                return;
            }
            match connector.discover_services(device_id).await {
                Ok(services) => ScanEvent::ServicesDiscovered {
                    device_id,
                    services,
                },
                Err(e) => ScanEvent::ServiceDiscoveryFailed {
                    device_id,
                    reason: failure_reason(e),
                },
            }
        }
        Err(e) => ScanEvent::ConnectionFailed {
            device_id,
            reason: failure_reason(e),
        },
    };

    if sink.send(event).await.is_err() {
        debug!(device_id = %device_id, "Session closed before connect result");
    }
}

fn failure_reason(error: DeviceError) -> String {
    match error {
        DeviceError::ConnectionFailure { reason, .. }
        | DeviceError::ServiceDiscoveryFailure { reason, .. } => reason,
        other => other.to_string(),
    }
}
