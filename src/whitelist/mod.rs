// 白名单模块
// 内存快照 + 可重新加载的外部存储，修改时先持久化再更新内存

pub mod store;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::PersistenceError;

pub use store::{
    JsonFileWhitelistStore, MemoryWhitelistStore, WhitelistSnapshot, WhitelistStore,
    WhitelistUserInfo,
};

/// 白名单条目（管理接口展示用）
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub user_id: i64,
    pub username: Option<String>,
    pub added_at: Option<chrono::DateTime<Utc>>,
}

/// 白名单授权门
pub struct WhitelistGate {
    enabled: bool,
    store: Arc<dyn WhitelistStore>,
    snapshot: RwLock<WhitelistSnapshot>,
}

impl WhitelistGate {
    /// 从存储加载快照
    pub async fn load(
        enabled: bool,
        store: Arc<dyn WhitelistStore>,
    ) -> Result<Self, PersistenceError> {
        let snapshot = store.load().await?;
        tracing::info!(
            "Whitelist loaded: {} users (enabled: {})",
            snapshot.users.len(),
            enabled
        );
        Ok(Self {
            enabled,
            store,
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 关闭时所有用户均视为已授权
    pub async fn is_authorized(&self, user_id: i64) -> bool {
        if !self.enabled {
            return true;
        }
        self.snapshot.read().await.users.contains(&user_id)
    }

    /// 添加用户，已存在时返回 `Ok(false)`
    pub async fn add(
        &self,
        user_id: i64,
        display_name: Option<String>,
    ) -> Result<bool, PersistenceError> {
        let mut current = self.snapshot.write().await;
        if current.users.contains(&user_id) {
            return Ok(false);
        }

        let mut next = current.clone();
        next.users.insert(user_id);
        if let Some(username) = display_name.filter(|n| !n.trim().is_empty()) {
            next.user_info.insert(
                user_id,
                WhitelistUserInfo {
                    username,
                    added_at: Utc::now(),
                },
            );
        }
        next.last_updated = Utc::now();

        self.store.save(&next).await?;
        *current = next;
        tracing::info!("User {} added to whitelist", user_id);
        Ok(true)
    }

    /// 移除用户，不存在时返回 `Ok(false)`
    pub async fn remove(&self, user_id: i64) -> Result<bool, PersistenceError> {
        let mut current = self.snapshot.write().await;
        if !current.users.contains(&user_id) {
            return Ok(false);
        }

        let mut next = current.clone();
        next.users.remove(&user_id);
        next.user_info.remove(&user_id);
        next.last_updated = Utc::now();

        self.store.save(&next).await?;
        *current = next;
        tracing::info!("User {} removed from whitelist", user_id);
        Ok(true)
    }

    /// 从存储重新加载，失败时保留当前快照
    pub async fn reload(&self) -> Result<usize, PersistenceError> {
        let mut current = self.snapshot.write().await;
        let fresh = self.store.load().await?;
        let count = fresh.users.len();
        *current = fresh;
        tracing::info!("Whitelist reloaded: {} users", count);
        Ok(count)
    }

    pub async fn users(&self) -> Vec<WhitelistEntry> {
        let snapshot = self.snapshot.read().await;
        let mut entries: Vec<WhitelistEntry> = snapshot
            .users
            .iter()
            .map(|&user_id| {
                let info = snapshot.user_info.get(&user_id);
                WhitelistEntry {
                    user_id,
                    username: info.map(|i| i.username.clone()),
                    added_at: info.map(|i| i.added_at),
                }
            })
            .collect();
        entries.sort_by_key(|e| e.user_id);
        entries
    }

    pub async fn user_count(&self) -> usize {
        self.snapshot.read().await.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 可以切换为写入失败的存储
    struct FlakyStore {
        inner: MemoryWhitelistStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl WhitelistStore for FlakyStore {
        async fn load(&self) -> Result<WhitelistSnapshot, PersistenceError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::Unavailable("disk gone".into()));
            }
            self.inner.load().await
        }

        async fn save(&self, snapshot: &WhitelistSnapshot) -> Result<(), PersistenceError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::Unavailable("disk gone".into()));
            }
            self.inner.save(snapshot).await
        }
    }

    fn flaky() -> Arc<FlakyStore> {
        Arc::new(FlakyStore {
            inner: MemoryWhitelistStore::default(),
            failing: AtomicBool::new(false),
        })
    }

    #[tokio::test]
    async fn add_and_remove_are_written_through() {
        let store = flaky();
        let gate = WhitelistGate::load(true, store.clone()).await.unwrap();

        assert!(!gate.is_authorized(7).await);
        assert!(gate.add(7, Some("bob".into())).await.unwrap());
        assert!(!gate.add(7, None).await.unwrap());
        assert!(gate.is_authorized(7).await);

        let persisted = store.load().await.unwrap();
        assert!(persisted.users.contains(&7));
        assert_eq!(persisted.user_info[&7].username, "bob");

        assert!(gate.remove(7).await.unwrap());
        assert!(!gate.remove(7).await.unwrap());
        assert!(!gate.is_authorized(7).await);
        assert!(store.load().await.unwrap().user_info.is_empty());
    }

    #[tokio::test]
    async fn failed_save_leaves_snapshot_unchanged() {
        let store = flaky();
        let gate = WhitelistGate::load(true, store.clone()).await.unwrap();
        gate.add(1, None).await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        assert!(gate.add(2, None).await.is_err());
        assert!(gate.remove(1).await.is_err());

        assert!(gate.is_authorized(1).await);
        assert!(!gate.is_authorized(2).await);
        assert_eq!(gate.user_count().await, 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_current_snapshot() {
        let store = flaky();
        let gate = WhitelistGate::load(true, store.clone()).await.unwrap();
        gate.add(5, None).await.unwrap();

        store.failing.store(true, Ordering::SeqCst);
        assert!(gate.reload().await.is_err());
        assert!(gate.is_authorized(5).await);
    }

    #[tokio::test]
    async fn reload_picks_up_external_edits() {
        let store = flaky();
        let gate = WhitelistGate::load(true, store.clone()).await.unwrap();

        let mut edited = WhitelistSnapshot::default();
        edited.users.insert(99);
        store.save(&edited).await.unwrap();

        assert!(!gate.is_authorized(99).await);
        assert_eq!(gate.reload().await.unwrap(), 1);
        assert!(gate.is_authorized(99).await);
    }

    /// 加载时停在中途，等待放行
    struct SlowLoadStore {
        inner: MemoryWhitelistStore,
        hold_loads: AtomicBool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl WhitelistStore for SlowLoadStore {
        async fn load(&self) -> Result<WhitelistSnapshot, PersistenceError> {
            let snapshot = self.inner.load().await;
            if self.hold_loads.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            snapshot
        }

        async fn save(&self, snapshot: &WhitelistSnapshot) -> Result<(), PersistenceError> {
            self.inner.save(snapshot).await
        }
    }

    #[tokio::test]
    async fn add_during_reload_is_not_lost() {
        let store = Arc::new(SlowLoadStore {
            inner: MemoryWhitelistStore::default(),
            hold_loads: AtomicBool::new(false),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        let gate = Arc::new(WhitelistGate::load(true, store.clone()).await.unwrap());

        store.hold_loads.store(true, Ordering::SeqCst);
        let reloading = tokio::spawn({
            let gate = gate.clone();
            async move { gate.reload().await }
        });
        store.entered.notified().await;
        store.hold_loads.store(false, Ordering::SeqCst);

        let adding = tokio::spawn({
            let gate = gate.clone();
            async move { gate.add(8, None).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!adding.is_finished());

        store.release.notify_one();
        assert_eq!(reloading.await.unwrap().unwrap(), 0);
        assert!(adding.await.unwrap().unwrap());

        assert!(gate.is_authorized(8).await);
        assert!(store.load().await.unwrap().users.contains(&8));
    }

    #[tokio::test]
    async fn disabled_gate_authorizes_everyone() {
        let gate = WhitelistGate::load(false, flaky()).await.unwrap();
        assert!(gate.is_authorized(12345).await);
        assert!(!gate.is_enabled());
    }
}
