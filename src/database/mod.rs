// 数据库模块
// 包含数据库实体定义和存储实现

pub mod models; // 数据库实体定义
pub mod operations; // 存储实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PersistenceError;

pub use models::{RateRecord, UsageLogEntry};
pub use operations::{MemoryStore, PgStore};

/// 可被清理任务清理的表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    RateRecords,
    UsageLogs,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::RateRecords => "api_requests",
            Table::UsageLogs => "usage_logs",
        }
    }
}

/// 限流记录与使用日志的持久化接口
#[async_trait]
pub trait Store: Send + Sync {
    /// 追加一条请求记录，返回记录ID
    async fn append_rate_record(
        &self,
        requested_at: DateTime<Utc>,
        success: bool,
    ) -> Result<i64, PersistenceError>;

    /// 将已有请求记录标记为成功
    async fn mark_rate_record_success(&self, id: i64) -> Result<(), PersistenceError>;

    /// 统计 `since` 之后（不含）的请求记录数
    async fn count_rate_records(
        &self,
        since: DateTime<Utc>,
        success_only: bool,
    ) -> Result<u64, PersistenceError>;

    async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), PersistenceError>;

    /// 删除 `cutoff` 之前（不含）的记录，返回删除条数
    async fn purge_older_than(
        &self,
        table: Table,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PersistenceError>;
}
