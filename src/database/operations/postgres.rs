// Postgres 存储
// 限流记录与使用日志的数据库操作

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Error as SqlxError, PgPool};
use std::sync::Arc;

use crate::database::{Store, Table, UsageLogEntry};
use crate::error::PersistenceError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS api_requests (
        id BIGSERIAL PRIMARY KEY,
        requested_at TIMESTAMPTZ NOT NULL,
        success BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS usage_logs (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        query TEXT NOT NULL,
        response_length BIGINT NOT NULL,
        logged_at TIMESTAMPTZ NOT NULL,
        success BOOLEAN NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_api_requests_requested_at ON api_requests (requested_at)",
    "CREATE INDEX IF NOT EXISTS idx_usage_logs_user_logged_at ON usage_logs (user_id, logged_at)",
];

/// Postgres 存储，处理所有限流记录和使用日志的数据库操作
pub struct PgStore {
    db: Arc<PgPool>,
}

impl PgStore {
    /// 创建新的存储实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    /// 建表（幂等）
    pub async fn migrate(&self) -> Result<(), SqlxError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&*self.db).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn append_rate_record(
        &self,
        requested_at: DateTime<Utc>,
        success: bool,
    ) -> Result<i64, PersistenceError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO api_requests (requested_at, success)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(requested_at)
        .bind(success)
        .fetch_one(&*self.db)
        .await?;

        Ok(id)
    }

    async fn mark_rate_record_success(&self, id: i64) -> Result<(), PersistenceError> {
        let result = sqlx::query("UPDATE api_requests SET success = TRUE WHERE id = $1")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::Database(SqlxError::RowNotFound));
        }
        Ok(())
    }

    async fn count_rate_records(
        &self,
        since: DateTime<Utc>,
        success_only: bool,
    ) -> Result<u64, PersistenceError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM api_requests
            WHERE requested_at > $1 AND ($2 = FALSE OR success)
            "#,
        )
        .bind(since)
        .bind(success_only)
        .fetch_one(&*self.db)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn append_usage_log(&self, entry: &UsageLogEntry) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO usage_logs (user_id, query, response_length, logged_at, success)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.query)
        .bind(entry.response_length)
        .bind(entry.logged_at)
        .bind(entry.success)
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn purge_older_than(
        &self,
        table: Table,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        // 表名来自固定枚举，不拼接外部输入
        let sql = match table {
            Table::RateRecords => "DELETE FROM api_requests WHERE requested_at < $1",
            Table::UsageLogs => "DELETE FROM usage_logs WHERE logged_at < $1",
        };
        let result = sqlx::query(sql).bind(cutoff).execute(&*self.db).await?;

        Ok(result.rows_affected())
    }
}
