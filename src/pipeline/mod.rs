// 查询处理流程
// 白名单 → 空查询帮助 → 话题过滤 → 限流 → 生成 → 使用日志

pub mod filter;
pub mod outcome;

use std::sync::Arc;

use crate::generator::{ContentGenerator, GenerationError};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::usage::UsageRecorder;
use crate::utils::truncate_chars;
use crate::whitelist::WhitelistGate;

pub use filter::ContentFilter;
pub use outcome::{FailureReason, Outcome};

// 生成长度的容差
const LONG_TOLERANCE: f64 = 1.2;
const SHORT_TOLERANCE: f64 = 0.8;

/// 限流与生成长度配置
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub per_minute: u32,
    pub per_day: u32,
    pub min_length: usize,
    pub max_length: usize,
}

/// 长度归一化：过长截断并追加省略号，过短只标记
pub fn normalize_length(text: String, min_length: usize, max_length: usize) -> (String, bool) {
    let len = text.chars().count();
    if len as f64 > max_length as f64 * LONG_TOLERANCE {
        tracing::warn!("Generated message too long: {} characters", len);
        return (truncate_chars(&text, max_length, "..."), false);
    }
    if (len as f64) < min_length as f64 * SHORT_TOLERANCE {
        tracing::warn!("Generated message too short: {} characters", len);
        return (text, true);
    }
    (text, false)
}

pub struct QueryPipeline {
    whitelist: Arc<WhitelistGate>,
    filter: ContentFilter,
    limiter: Arc<RateLimiter>,
    generator: Arc<dyn ContentGenerator>,
    usage: UsageRecorder,
    limits: QueryLimits,
}

impl QueryPipeline {
    pub fn new(
        whitelist: Arc<WhitelistGate>,
        filter: ContentFilter,
        limiter: Arc<RateLimiter>,
        generator: Arc<dyn ContentGenerator>,
        usage: UsageRecorder,
        limits: QueryLimits,
    ) -> Self {
        Self {
            whitelist,
            filter,
            limiter,
            generator,
            usage,
            limits,
        }
    }

    /// 处理一条未被取代的查询，总是返回一个终态
    pub async fn run(&self, user_id: i64, text: &str) -> Outcome {
        let topic = text.trim();

        if !self.whitelist.is_authorized(user_id).await {
            tracing::warn!("Unauthorized access attempt from user {}", user_id);
            return Outcome::Denied;
        }

        if topic.is_empty() {
            return Outcome::Help;
        }

        if let Some(keyword) = self.filter.matched_keyword(topic) {
            tracing::info!("Filtered topic from user {} (matched '{}')", user_id, keyword);
            return Outcome::Filtered;
        }

        let reservation = match self
            .limiter
            .check_and_reserve(self.limits.per_minute, self.limits.per_day)
            .await
        {
            Ok(RateDecision::Allowed(reservation)) => reservation,
            Ok(RateDecision::Denied { reason, .. }) => return Outcome::RateLimited { reason },
            Err(e) => {
                // 无法记账时不调用生成服务
                tracing::error!("Failed to reserve API request: {}", e);
                return Outcome::GenerationFailed(FailureReason::StoreUnavailable);
            }
        };

        tracing::info!("Generating message for topic: '{}'", topic);
        let generated = self
            .generator
            .generate(topic, self.limits.min_length, self.limits.max_length)
            .await;

        match generated {
            Ok(text) if !text.trim().is_empty() => {
                if let Err(e) = self.limiter.promote(reservation).await {
                    tracing::error!("Failed to mark API request as successful: {}", e);
                }

                let (text, short) =
                    normalize_length(text, self.limits.min_length, self.limits.max_length);
                self.usage
                    .record(user_id, topic, text.chars().count(), true);
                tracing::info!("Successfully generated message for user {}", user_id);
                Outcome::Generated { text, short }
            }
            Ok(_) | Err(GenerationError::Empty) => {
                self.usage.record(user_id, topic, 0, false);
                tracing::warn!("Empty generation result for user {}", user_id);
                Outcome::GenerationFailed(FailureReason::EmptyResult)
            }
            Err(e) => {
                self.usage.record(user_id, topic, 0, false);
                tracing::error!("Error generating message for user {}: {}", user_id, e);
                Outcome::GenerationFailed(FailureReason::ProviderError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_truncated_to_max() {
        let (text, short) = normalize_length("x".repeat(500), 300, 400);
        assert_eq!(text.chars().count(), 403);
        assert!(text.ends_with("..."));
        assert!(!short);
    }

    #[test]
    fn text_within_tolerance_is_untouched() {
        let (text, short) = normalize_length("x".repeat(480), 300, 400);
        assert_eq!(text.len(), 480);
        assert!(!short);

        let (text, short) = normalize_length("x".repeat(240), 300, 400);
        assert_eq!(text.len(), 240);
        assert!(!short);
    }

    #[test]
    fn short_text_is_flagged_not_rejected() {
        let (text, short) = normalize_length("tiny".to_string(), 300, 400);
        assert_eq!(text, "tiny");
        assert!(short);
    }
}
