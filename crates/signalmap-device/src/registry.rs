use crate::model::{ConnectionState, DeviceRecord, DiscoveryEvent};
use crate::{DeviceError, Result};
use chrono::Duration;
use signalmap_config::ScannerConfig;
use signalmap_types::{DeviceId, GeoCoordinate, Sample};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

/// 更新策略：节流窗口、信号门限、距离门限
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryPolicy {
    /// 节流窗口，窗口内（含边界）的事件被丢弃
    pub throttle: Duration,

    /// 信号强度变化 >= 该值才更新
    pub min_signal_delta: i32,

    /// 与上一个采样点距离 >= 该值才追加采样
    pub min_sample_distance_m: f64,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            throttle: Duration::seconds(1),
            min_signal_delta: 2,
            min_sample_distance_m: 1.0,
        }
    }
}

impl From<&ScannerConfig> for RegistryPolicy {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            throttle: Duration::milliseconds(config.throttle_ms.min(i64::MAX as u64) as i64),
            min_signal_delta: config.min_signal_delta,
            min_sample_distance_m: config.min_sample_distance_m,
        }
    }
}

/// 一次发现事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 新建记录
    Created { sample_appended: bool },

    /// 节流窗口内，事件被丢弃
    Throttled,

    /// 已更新
    Updated {
        signal_changed: bool,
        sample_appended: bool,
        location_missing: bool,
    },
}

impl UpdateOutcome {
    /// 是否修改了记录
    pub fn is_mutation(&self) -> bool {
        !matches!(self, UpdateOutcome::Throttled)
    }
}

/// 设备注册表
///
/// 设备 ID -> 设备记录的权威映射。纯同步状态机，由扫描会话在单一事件循环中驱动，
/// 保证一次更新的多个字段对读者原子可见。
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, DeviceRecord>,
    policy: RegistryPolicy,
}

impl DeviceRegistry {
    /// 创建新的设备注册表
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            devices: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// 处理一次原始发现事件
    ///
    /// 已存在的记录按 节流 -> 信号门限 -> 名称/服务刷新 -> 距离门限 -> 时间戳 的顺序更新。
    /// `location` 为事件到达时的当前定位。
    pub fn on_discovered(
        &mut self,
        event: DiscoveryEvent,
        location: Option<GeoCoordinate>,
    ) -> UpdateOutcome {
        let now = event.timestamp;

        let record = match self.devices.entry(event.id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let record = entry.insert(DeviceRecord::new(&event, location));
                info!(
                    device_id = %record.id,
                    device_name = %record.display_name,
                    signal_strength = record.signal_strength,
                    "Device discovered"
                );
                return UpdateOutcome::Created {
                    sample_appended: !record.samples.is_empty(),
                };
            }
        };

        // 1. 节流
        if now - record.last_updated <= self.policy.throttle {
            return UpdateOutcome::Throttled;
        }

        // 2. 信号门限
        let delta = record.signal_strength.abs_diff(event.signal_strength);
        let signal_changed = delta >= self.policy.min_signal_delta.unsigned_abs();
        if signal_changed {
            record.signal_strength = event.signal_strength;
        }

        // 3. 名称与广播服务
        if let Some(name) = event.name {
            record.display_name = name;
        }
        record.advertised_services = event.advertised_services.into_iter().collect();

        // 4. 距离门限，使用门限后的信号强度
        let sample_appended = match location {
            Some(location) => {
                let far_enough = match record.samples.last() {
                    Some(last) => {
                        last.location.planar_distance_m(&location)
                            >= self.policy.min_sample_distance_m
                    }
                    None => true,
                };
                if far_enough {
                    record
                        .samples
                        .push(Sample::new(location, record.signal_strength, now));
                }
                far_enough
            }
            None => false,
        };

        // 5. 时间戳
        record.last_updated = now;

        debug!(
            device_id = %record.id,
            signal_strength = record.signal_strength,
            signal_changed,
            sample_appended,
            samples = record.samples.len(),
            "Device updated"
        );

        UpdateOutcome::Updated {
            signal_changed,
            sample_appended,
            location_missing: location.is_none(),
        }
    }

    /// 记录服务发现结果
    pub fn on_services_discovered(&mut self, device_id: &DeviceId, services: Vec<String>) -> Result<()> {
        let record = self.get_mut(device_id)?;
        record.services = services.into_iter().collect();
        record.connection = ConnectionState::Connected;
        debug!(device_id = %device_id, services = record.services.len(), "Services recorded");
        Ok(())
    }

    /// 设置连接状态
    pub fn set_connection_state(&mut self, device_id: &DeviceId, state: ConnectionState) -> Result<()> {
        let record = self.get_mut(device_id)?;
        record.connection = state;
        Ok(())
    }

    /// 清空某个设备的采样序列，返回被清除的采样数
    pub fn clear_samples(&mut self, device_id: &DeviceId) -> Result<usize> {
        let record = self.get_mut(device_id)?;
        let cleared = record.samples.len();
        record.samples.clear();
        info!(device_id = %device_id, cleared, "Device samples cleared");
        Ok(cleared)
    }

    /// 清空整个注册表
    pub fn reset(&mut self) {
        let count = self.devices.len();
        self.devices.clear();
        info!(count, "Device registry reset");
    }

    /// 获取设备记录
    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(device_id)
    }

    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.contains_key(device_id)
    }

    /// 所有设备记录
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    /// 复制当前全部记录
    pub fn snapshot(&self) -> HashMap<DeviceId, DeviceRecord> {
        self.devices.clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    // ========== 私有辅助方法 ==========

    fn get_mut(&mut self, device_id: &DeviceId) -> Result<&mut DeviceRecord> {
        self.devices
            .get_mut(device_id)
            .ok_or(DeviceError::UnknownDevice(*device_id))
    }
}
