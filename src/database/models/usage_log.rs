// 使用日志实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 使用日志，对应数据库中的 usage_logs 表，写入后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct UsageLogEntry {
    /// 用户ID
    pub user_id: i64,
    /// 查询文本
    pub query: String,
    /// 生成内容长度（字符数），失败时为 0
    pub response_length: i64,
    /// 记录时间
    pub logged_at: DateTime<Utc>,
    /// 是否成功
    pub success: bool,
}

impl UsageLogEntry {
    pub fn new(user_id: i64, query: &str, response_length: usize, success: bool) -> Self {
        Self {
            user_id,
            query: query.to_string(),
            response_length: response_length as i64,
            logged_at: Utc::now(),
            success,
        }
    }
}
