// 项目级 API 限流
// 以存储中的请求记录为准，按 1 分钟和 1 天两个滑动窗口计数

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::database::Store;
use crate::error::PersistenceError;

/// 触发限流的窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Minute,
    Day,
}

/// 已预占的请求额度，生成成功后需要 [`RateLimiter::promote`]
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation should be promoted once generation succeeds"]
pub struct Reservation {
    record_id: i64,
}

impl Reservation {
    pub fn record_id(&self) -> i64 {
        self.record_id
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed(Reservation),
    Denied { window: RateWindow, reason: String },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed(_))
    }
}

/// 项目级限流器，不区分用户
pub struct RateLimiter {
    store: Arc<dyn Store>,
    // 串行化 检查-记录 序列
    lock: Mutex<()>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// 仅检查，不占用额度
    pub async fn check(
        &self,
        per_minute: u32,
        per_day: u32,
    ) -> Result<Option<(RateWindow, String)>, PersistenceError> {
        let _guard = self.lock.lock().await;
        self.evaluate(per_minute, per_day).await
    }

    /// 检查并预占一次额度：允许时写入一条 success=false 的请求记录
    pub async fn check_and_reserve(
        &self,
        per_minute: u32,
        per_day: u32,
    ) -> Result<RateDecision, PersistenceError> {
        let _guard = self.lock.lock().await;

        if let Some((window, reason)) = self.evaluate(per_minute, per_day).await? {
            tracing::warn!("API rate limit hit ({:?} window)", window);
            return Ok(RateDecision::Denied { window, reason });
        }

        let record_id = self.store.append_rate_record(Utc::now(), false).await?;
        tracing::debug!("Reserved API request slot {}", record_id);
        Ok(RateDecision::Allowed(Reservation { record_id }))
    }

    /// 追加一条请求记录
    pub async fn record_request(&self, success: bool) -> Result<i64, PersistenceError> {
        let _guard = self.lock.lock().await;
        self.store.append_rate_record(Utc::now(), success).await
    }

    /// 将预占的请求标记为成功
    pub async fn promote(&self, reservation: Reservation) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        self.store
            .mark_rate_record_success(reservation.record_id)
            .await
    }

    // 失败的尝试同样计入窗口，所以这里统计全部记录
    async fn evaluate(
        &self,
        per_minute: u32,
        per_day: u32,
    ) -> Result<Option<(RateWindow, String)>, PersistenceError> {
        let now = Utc::now();

        let minute_count = self
            .store
            .count_rate_records(now - Duration::minutes(1), false)
            .await?;
        if minute_count >= u64::from(per_minute) {
            return Ok(Some((
                RateWindow::Minute,
                format!(
                    "API rate limit exceeded: {} requests per minute. Please try again later.",
                    per_minute
                ),
            )));
        }

        let day_count = self
            .store
            .count_rate_records(now - Duration::days(1), false)
            .await?;
        if day_count >= u64::from(per_day) {
            return Ok(Some((
                RateWindow::Day,
                format!(
                    "Daily API limit exceeded: {} requests per day. Please try again tomorrow.",
                    per_day
                ),
            )));
        }

        Ok(None)
    }
}
