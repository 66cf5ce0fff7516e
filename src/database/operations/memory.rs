// 内存存储
// 未配置数据库时使用，进程重启后记录丢失

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::database::{RateRecord, Store, Table, UsageLogEntry};
use crate::error::PersistenceError;

#[derive(Default)]
struct Tables {
    next_id: i64,
    rate_records: Vec<RateRecord>,
    usage_logs: Vec<UsageLogEntry>,
}

/// 内存存储，实现与 [`super::PgStore`] 相同的语义
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // 持锁期间不会 panic，中毒时直接沿用数据
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 当前所有请求记录的快照
    pub fn rate_records(&self) -> Vec<RateRecord> {
        self.lock().rate_records.clone()
    }

    /// 当前所有使用日志的快照
    pub fn usage_logs(&self) -> Vec<UsageLogEntry> {
        self.lock().usage_logs.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append_rate_record(
        &self,
        requested_at: DateTime<Utc>,
        success: bool,
    ) -> Result<i64, PersistenceError> {
        let mut tables = self.lock();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.rate_records.push(RateRecord {
            id,
            requested_at,
            success,
        });
        Ok(id)
    }

    async fn mark_rate_record_success(&self, id: i64) -> Result<(), PersistenceError> {
        let mut tables = self.lock();
        match tables.rate_records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.success = true;
                Ok(())
            }
            None => Err(PersistenceError::Unavailable(format!(
                "rate record {} not found",
                id
            ))),
        }
    }

    async fn count_rate_records(
        &self,
        since: DateTime<Utc>,
        success_only: bool,
    ) -> Result<u64, PersistenceError> {
        let tables = self.lock();
        let count = tables
            .rate_records
            .iter()
            .filter(|r| r.requested_at > since && (!success_only || r.success))
            .count();
        Ok(count as u64)
    }

    async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), PersistenceError> {
        self.lock().usage_logs.push(entry.clone());
        Ok(())
    }

    async fn purge_older_than(
        &self,
        table: Table,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        let mut tables = self.lock();
        let removed = match table {
            Table::RateRecords => {
                let before = tables.rate_records.len();
                tables.rate_records.retain(|r| r.requested_at >= cutoff);
                before - tables.rate_records.len()
            }
            Table::UsageLogs => {
                let before = tables.usage_logs.len();
                tables.usage_logs.retain(|e| e.logged_at >= cutoff);
                before - tables.usage_logs.len()
            }
        };
        Ok(removed as u64)
    }
}
