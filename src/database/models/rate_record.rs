// API 请求记录实体
// 限流窗口的计数全部由这张表推导，不单独存储计数器

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 请求记录，对应数据库中的 api_requests 表
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RateRecord {
    /// 记录ID
    pub id: i64,
    /// 请求发起时间
    pub requested_at: DateTime<Utc>,
    /// 是否已确认生成成功
    pub success: bool,
}
