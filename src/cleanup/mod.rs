// 定期清理过期的限流记录和使用日志

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::database::{Store, Table};

/// 单次清理结果，`None` 表示该表清理失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub rate_records_removed: Option<u64>,
    pub usage_logs_removed: Option<u64>,
}

pub struct CleanupScheduler {
    store: Arc<dyn Store>,
    rate_retention: Duration,
    usage_retention: Duration,
}

impl CleanupScheduler {
    pub fn new(store: Arc<dyn Store>, rate_retention: Duration, usage_retention: Duration) -> Self {
        if rate_retention > usage_retention {
            tracing::warn!(
                "Rate record retention ({} days) exceeds usage log retention ({} days)",
                rate_retention.num_days(),
                usage_retention.num_days()
            );
        }
        Self {
            store,
            rate_retention,
            usage_retention,
        }
    }

    /// 清理一次，两张表分别处理，一张失败不影响另一张
    pub async fn run_once(&self, now: DateTime<Utc>) -> CleanupReport {
        let rate_records_removed = self
            .purge(Table::RateRecords, now - self.rate_retention)
            .await;
        let usage_logs_removed = self
            .purge(Table::UsageLogs, now - self.usage_retention)
            .await;

        tracing::info!(
            "Cleanup finished: {:?} rate records, {:?} usage logs removed",
            rate_records_removed,
            usage_logs_removed
        );
        CleanupReport {
            rate_records_removed,
            usage_logs_removed,
        }
    }

    async fn purge(&self, table: Table, cutoff: DateTime<Utc>) -> Option<u64> {
        match self.store.purge_older_than(table, cutoff).await {
            Ok(removed) => Some(removed),
            Err(e) => {
                tracing::error!("Failed to purge {}: {}", table.name(), e);
                None
            }
        }
    }

    /// 首次延迟 `first_delay` 后运行，之后每隔 `interval` 运行一次
    pub fn run_periodic(
        self,
        first_delay: std::time::Duration,
        interval: std::time::Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + first_delay, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once(Utc::now()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, UsageLogEntry};
    use crate::error::PersistenceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn purges_each_table_with_its_own_retention() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        store.append_rate_record(now - Duration::days(8), true).await.unwrap();
        store.append_rate_record(now - Duration::days(7), true).await.unwrap();
        store.append_rate_record(now - Duration::days(1), false).await.unwrap();

        let mut old_log = UsageLogEntry::new(1, "old", 10, true);
        old_log.logged_at = now - Duration::days(91);
        let mut kept_log = UsageLogEntry::new(1, "kept", 10, true);
        kept_log.logged_at = now - Duration::days(30);
        store.append_usage_log(&old_log).await.unwrap();
        store.append_usage_log(&kept_log).await.unwrap();

        let scheduler = CleanupScheduler::new(store.clone(), Duration::days(7), Duration::days(90));
        let report = scheduler.run_once(now).await;

        assert_eq!(report.rate_records_removed, Some(1));
        assert_eq!(report.usage_logs_removed, Some(1));
        // 恰好等于截止时间的记录保留
        assert_eq!(store.rate_records().len(), 2);
        assert_eq!(store.usage_logs()[0].query, "kept");
    }

    /// 清理限流记录时失败的存储
    struct FailingRatePurge {
        inner: MemoryStore,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Store for FailingRatePurge {
        async fn append_rate_record(
            &self,
            requested_at: DateTime<Utc>,
            success: bool,
        ) -> Result<i64, PersistenceError> {
            self.inner.append_rate_record(requested_at, success).await
        }

        async fn mark_rate_record_success(&self, id: i64) -> Result<(), PersistenceError> {
            self.inner.mark_rate_record_success(id).await
        }

        async fn count_rate_records(
            &self,
            since: DateTime<Utc>,
            success_only: bool,
        ) -> Result<u64, PersistenceError> {
            self.inner.count_rate_records(since, success_only).await
        }

        async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), PersistenceError> {
            self.inner.append_usage_log(entry).await
        }

        async fn purge_older_than(
            &self,
            table: Table,
            cutoff: DateTime<Utc>,
        ) -> Result<u64, PersistenceError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match table {
                Table::RateRecords => Err(PersistenceError::Unavailable("locked".into())),
                Table::UsageLogs => self.inner.purge_older_than(table, cutoff).await,
            }
        }
    }

    #[tokio::test]
    async fn failure_on_one_table_does_not_skip_the_other() {
        let store = Arc::new(FailingRatePurge {
            inner: MemoryStore::new(),
            attempts: AtomicUsize::new(0),
        });
        let scheduler = CleanupScheduler::new(store.clone(), Duration::days(7), Duration::days(90));

        let report = scheduler.run_once(Utc::now()).await;
        assert_eq!(report.rate_records_removed, None);
        assert_eq!(report.usage_logs_removed, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_runs_keep_going_after_failures() {
        let store = Arc::new(FailingRatePurge {
            inner: MemoryStore::new(),
            attempts: AtomicUsize::new(0),
        });
        let scheduler = CleanupScheduler::new(store.clone(), Duration::days(7), Duration::days(90));

        let handle = scheduler.run_periodic(
            std::time::Duration::from_secs(60),
            std::time::Duration::from_secs(3600),
        );

        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        assert_eq!(store.attempts.load(Ordering::SeqCst), 0);

        // 首次运行 + 两个周期
        tokio::time::sleep(std::time::Duration::from_secs(60 + 2 * 3600)).await;
        assert_eq!(store.attempts.load(Ordering::SeqCst), 6);

        handle.abort();
    }
}
