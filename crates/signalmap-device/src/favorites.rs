use async_trait::async_trait;
use signalmap_types::DeviceId;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::model::FavoriteDevice;
use crate::{DeviceError, Result};

/// 收藏存储（外部键值存储的抽象）
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// 添加收藏，已存在时返回已有记录
    async fn add(&self, id: DeviceId, name: &str) -> Result<FavoriteDevice>;

    /// 移除收藏，返回是否存在
    async fn remove(&self, id: &DeviceId) -> Result<bool>;

    /// 所有收藏，按创建时间排序
    async fn list(&self) -> Result<Vec<FavoriteDevice>>;
}

/// 付费功能授权
pub trait Entitlement: Send + Sync {
    fn is_unlocked(&self) -> bool;
}

/// 始终解锁
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlocked;

impl Entitlement for Unlocked {
    fn is_unlocked(&self) -> bool {
        true
    }
}

/// 固定授权状态
#[derive(Debug, Clone, Copy)]
pub struct StaticEntitlement(pub bool);

impl Entitlement for StaticEntitlement {
    fn is_unlocked(&self) -> bool {
        self.0
    }
}

/// 内存收藏存储
#[derive(Default)]
pub struct InMemoryFavoriteStore {
    favorites: RwLock<Vec<FavoriteDevice>>,
}

impl InMemoryFavoriteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FavoriteStore for InMemoryFavoriteStore {
    async fn add(&self, id: DeviceId, name: &str) -> Result<FavoriteDevice> {
        let mut favorites = self.favorites.write().await;
        if let Some(existing) = favorites.iter().find(|f| f.id == id) {
            return Ok(existing.clone());
        }
        let favorite = FavoriteDevice::new(id, name);
        favorites.push(favorite.clone());
        Ok(favorite)
    }

    async fn remove(&self, id: &DeviceId) -> Result<bool> {
        let mut favorites = self.favorites.write().await;
        let before = favorites.len();
        favorites.retain(|f| &f.id != id);
        Ok(favorites.len() != before)
    }

    async fn list(&self) -> Result<Vec<FavoriteDevice>> {
        let mut favorites = self.favorites.read().await.clone();
        favorites.sort_by_key(|f| f.created_at);
        Ok(favorites)
    }
}

/// 收藏管理
///
/// 增删收藏需要解锁；读取不受限制。
#[derive(Clone)]
pub struct Favorites {
    store: Arc<dyn FavoriteStore>,
    entitlement: Arc<dyn Entitlement>,
}

impl Favorites {
    pub fn new(store: Arc<dyn FavoriteStore>, entitlement: Arc<dyn Entitlement>) -> Self {
        Self { store, entitlement }
    }

    /// 内存存储 + 始终解锁
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryFavoriteStore::new()), Arc::new(Unlocked))
    }

    pub fn entitlement(&self) -> &dyn Entitlement {
        self.entitlement.as_ref()
    }

    /// 收藏设备
    pub async fn add(&self, id: DeviceId, name: &str) -> Result<FavoriteDevice> {
        self.ensure_unlocked()?;
        let favorite = self.store.add(id, name).await?;
        info!(device_id = %id, device_name = %name, "Device added to favorites");
        Ok(favorite)
    }

    /// 取消收藏
    pub async fn remove(&self, id: &DeviceId) -> Result<bool> {
        self.ensure_unlocked()?;
        let removed = self.store.remove(id).await?;
        if removed {
            info!(device_id = %id, "Device removed from favorites");
        } else {
            debug!(device_id = %id, "Device was not a favorite");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<FavoriteDevice>> {
        self.store.list().await
    }

    pub async fn contains(&self, id: &DeviceId) -> Result<bool> {
        Ok(self.store.list().await?.iter().any(|f| &f.id == id))
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.entitlement.is_unlocked() {
            Ok(())
        } else {
            debug!("Favorites locked");
            Err(DeviceError::FeatureLocked("favorites".to_string()))
        }
    }
}
