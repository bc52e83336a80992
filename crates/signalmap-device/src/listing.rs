use serde::{Deserialize, Serialize};
use signalmap_types::DeviceId;
use std::collections::HashSet;
use tracing::debug;

use crate::favorites::Entitlement;
use crate::model::{DeviceRecord, FavoriteDevice};
use crate::{DeviceError, Result};

/// 设备列表过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    /// 隐藏未命名设备（只作用于附近设备，需要解锁）
    pub hide_unknown: bool,
}

impl ListingFilter {
    pub fn hide_unknown() -> Self {
        Self { hide_unknown: true }
    }
}

/// 设备列表
///
/// 收藏设备和附近设备两组，均按信号强度从强到弱排序。
#[derive(Debug, Clone, Default)]
pub struct DeviceListing {
    pub favorites: Vec<DeviceRecord>,
    pub nearby: Vec<DeviceRecord>,
}

impl DeviceListing {
    /// 由注册表快照构建列表
    ///
    /// 收藏但当前未被发现的设备不出现在列表中。
    pub fn build<I>(
        devices: I,
        favorites: &[FavoriteDevice],
        filter: &ListingFilter,
        entitlement: &dyn Entitlement,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = DeviceRecord>,
    {
        if filter.hide_unknown && !entitlement.is_unlocked() {
            debug!("Device filtering locked");
            return Err(DeviceError::FeatureLocked("filtering".to_string()));
        }

        let favorite_ids: HashSet<DeviceId> = favorites.iter().map(|f| f.id).collect();
        let mut listing = Self::default();

        for record in devices {
            if favorite_ids.contains(&record.id) {
                listing.favorites.push(record);
            } else if !(filter.hide_unknown && record.is_unknown()) {
                listing.nearby.push(record);
            }
        }

        sort_by_signal(&mut listing.favorites);
        sort_by_signal(&mut listing.nearby);
        Ok(listing)
    }

    pub fn favorite_count(&self) -> usize {
        self.favorites.len()
    }

    pub fn nearby_count(&self) -> usize {
        self.nearby.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty() && self.nearby.is_empty()
    }
}

// 信号相同按 ID 排序，保证列表稳定
fn sort_by_signal(records: &mut [DeviceRecord]) {
    records.sort_by(|a, b| {
        b.signal_strength
            .cmp(&a.signal_strength)
            .then_with(|| a.id.cmp(&b.id))
    });
}
