//! 模拟的发现源、定位源和连接器
//!
//! 用于示例程序和测试，由调用方手动推送事件。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalmap_types::{DeviceId, GeoCoordinate};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::events::EventSink;
use crate::model::{AdapterState, DiscoveryEvent};
use crate::port::{Connector, DiscoverySource, LocationSource};
use crate::{DeviceError, Result};

/// 模拟发现源
pub struct SimulatedDiscovery {
    adapter: RwLock<AdapterState>,
    sink: RwLock<Option<EventSink>>,
}

impl SimulatedDiscovery {
    pub fn new(adapter: AdapterState) -> Self {
        Self {
            adapter: RwLock::new(adapter),
            sink: RwLock::new(None),
        }
    }

    /// 适配器已开启的发现源
    pub fn powered_on() -> Self {
        Self::new(AdapterState::PoweredOn)
    }

    /// 修改适配器状态，扫描中时同时通知会话
    pub async fn set_adapter_state(&self, state: AdapterState) -> Result<()> {
        *self.adapter.write().await = state;
        let sink = self.sink.read().await.clone();
        if let Some(sink) = sink {
            sink.adapter_state(state).await?;
        }
        Ok(())
    }

    /// 上报一次广播，未扫描时忽略并返回 false
    pub async fn advertise(&self, event: DiscoveryEvent) -> Result<bool> {
        let sink = self.sink.read().await.clone();
        match sink {
            Some(sink) => {
                sink.discovered(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn is_scanning(&self) -> bool {
        self.sink.read().await.is_some()
    }
}

#[async_trait]
impl DiscoverySource for SimulatedDiscovery {
    async fn adapter_state(&self) -> AdapterState {
        *self.adapter.read().await
    }

    async fn start_scanning(&self, sink: EventSink) -> Result<()> {
        *self.sink.write().await = Some(sink);
        debug!("Simulated scan started");
        Ok(())
    }

    async fn stop_scanning(&self) -> Result<()> {
        *self.sink.write().await = None;
        debug!("Simulated scan stopped");
        Ok(())
    }
}

/// 模拟定位源
pub struct SimulatedLocation {
    authorized: RwLock<bool>,
    grant_on_request: bool,
    sink: RwLock<Option<EventSink>>,
}

impl SimulatedLocation {
    /// `grant_on_request` 为 false 时模拟用户拒绝授权
    pub fn new(grant_on_request: bool) -> Self {
        Self {
            authorized: RwLock::new(false),
            grant_on_request,
            sink: RwLock::new(None),
        }
    }

    /// 推送一次定位，未开始更新时返回 false
    pub async fn move_to(&self, coordinate: GeoCoordinate, timestamp: DateTime<Utc>) -> Result<bool> {
        let sink = self.sink.read().await.clone();
        match sink {
            Some(sink) => {
                sink.location(coordinate, timestamp).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for SimulatedLocation {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl LocationSource for SimulatedLocation {
    async fn is_authorized(&self) -> bool {
        *self.authorized.read().await
    }

    async fn request_authorization(&self) -> Result<()> {
        *self.authorized.write().await = self.grant_on_request;
        Ok(())
    }

    async fn start_updating(&self, sink: EventSink) -> Result<()> {
        if !*self.authorized.read().await {
            return Err(DeviceError::internal("location not authorized"));
        }
        *self.sink.write().await = Some(sink);
        Ok(())
    }
}

/// 单个设备的连接脚本
#[derive(Debug, Clone)]
pub enum ConnectScript {
    /// 连接成功并返回服务列表
    Succeed(Vec<String>),
    /// 连接失败
    FailConnect(String),
    /// 连接成功但服务发现失败
    FailDiscovery(String),
    /// 永不完成
    Hang,
}

/// 模拟连接器
///
/// 未配置脚本的设备连接成功且没有服务。
pub struct SimulatedConnector {
    scripts: RwLock<HashMap<DeviceId, ConnectScript>>,
    attempts: RwLock<HashMap<DeviceId, usize>>,
    latency: Duration,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub async fn script(&self, device_id: DeviceId, script: ConnectScript) {
        self.scripts.write().await.insert(device_id, script);
    }

    /// 某设备的连接尝试次数
    pub async fn attempts(&self, device_id: &DeviceId) -> usize {
        self.attempts.read().await.get(device_id).copied().unwrap_or(0)
    }

    async fn script_for(&self, device_id: &DeviceId) -> ConnectScript {
        self.scripts
            .read()
            .await
            .get(device_id)
            .cloned()
            .unwrap_or(ConnectScript::Succeed(Vec::new()))
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, device_id: DeviceId) -> Result<()> {
        *self.attempts.write().await.entry(device_id).or_insert(0) += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.script_for(&device_id).await {
            ConnectScript::FailConnect(reason) => Err(DeviceError::connection(device_id, reason)),
            ConnectScript::Hang => std::future::pending().await,
            _ => Ok(()),
        }
    }

    async fn discover_services(&self, device_id: DeviceId) -> Result<Vec<String>> {
        match self.script_for(&device_id).await {
            ConnectScript::Succeed(services) => Ok(services),
            ConnectScript::FailDiscovery(reason) => {
                Err(DeviceError::service_discovery(device_id, reason))
            }
            ConnectScript::FailConnect(reason) => Err(DeviceError::connection(device_id, reason)),
            ConnectScript::Hang => std::future::pending().await,
        }
    }
}
