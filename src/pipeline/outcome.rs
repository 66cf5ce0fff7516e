use crate::transport::InlineAnswer;
use crate::utils::truncate_chars;

// 稳定状态缓存更久，临时状态缓存较短
const STABLE_CACHE_SECS: u32 = 300;
const RATE_LIMIT_CACHE_SECS: u32 = 60;
const GENERATION_CACHE_SECS: u32 = 30;
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// 生成失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// 服务返回空文本
    EmptyResult,
    /// 调用服务出错
    ProviderError,
    /// 无法记录请求，未调用生成服务
    StoreUnavailable,
}

/// 一次查询的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Denied,
    Help,
    Filtered,
    RateLimited { reason: String },
    Generated { text: String, short: bool },
    GenerationFailed(FailureReason),
}

impl Outcome {
    pub fn cache_seconds(&self) -> u32 {
        match self {
            Outcome::Denied | Outcome::Help | Outcome::Filtered => STABLE_CACHE_SECS,
            Outcome::RateLimited { .. } => RATE_LIMIT_CACHE_SECS,
            Outcome::Generated { .. } | Outcome::GenerationFailed(_) => GENERATION_CACHE_SECS,
        }
    }

    pub fn into_answer(self, bot_username: &str) -> InlineAnswer {
        let cache_seconds = self.cache_seconds();
        let (title, description, body) = match self {
            Outcome::Denied => (
                "🚫 Access Denied".to_string(),
                "You are not authorized to use this bot".to_string(),
                "Sorry, you are not authorized to use this bot. \
                 Please contact the administrator for access."
                    .to_string(),
            ),
            Outcome::Help => (
                "💡 How to use this bot".to_string(),
                "Type a topic or message to generate content".to_string(),
                format!(
                    "Usage: @{name} <topic>\nExample: @{name} IPv6\n\
                     Or: @{name} I think IPv6 is great because...",
                    name = bot_username
                ),
            ),
            Outcome::Filtered => (
                "❌ Inappropriate Content".to_string(),
                "This topic is not suitable for content generation".to_string(),
                "Sorry, I cannot generate content for this topic. \
                 Please try a different subject."
                    .to_string(),
            ),
            Outcome::RateLimited { reason } => (
                "⚠️ API Rate Limit Exceeded".to_string(),
                reason.clone(),
                format!("API rate limit exceeded. Please try again later.\n\n{}", reason),
            ),
            Outcome::Generated { text, .. } => (
                "✨ Generated Message".to_string(),
                truncate_chars(&text, DESCRIPTION_PREVIEW_CHARS, "..."),
                text,
            ),
            Outcome::GenerationFailed(FailureReason::EmptyResult) => (
                "❌ Generation Failed".to_string(),
                "Unable to generate message. Please try again.".to_string(),
                "Sorry, I couldn't generate a message for that topic. \
                 Please try again with a different topic."
                    .to_string(),
            ),
            Outcome::GenerationFailed(_) => (
                "❌ Error".to_string(),
                "An error occurred. Please try again.".to_string(),
                "Sorry, an error occurred while processing your request. Please try again."
                    .to_string(),
            ),
        };

        InlineAnswer {
            title,
            description,
            body,
            cache_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_durations_follow_outcome_stability() {
        assert_eq!(Outcome::Denied.cache_seconds(), 300);
        assert_eq!(Outcome::Help.cache_seconds(), 300);
        assert_eq!(Outcome::Filtered.cache_seconds(), 300);
        assert_eq!(
            Outcome::RateLimited { reason: "x".into() }.cache_seconds(),
            60
        );
        assert_eq!(
            Outcome::GenerationFailed(FailureReason::ProviderError).cache_seconds(),
            30
        );
    }

    #[test]
    fn generated_answer_previews_long_text() {
        let text = "a".repeat(250);
        let answer = Outcome::Generated {
            text: text.clone(),
            short: false,
        }
        .into_answer("vibebot");

        assert_eq!(answer.body, text);
        assert_eq!(answer.description.chars().count(), 103);
        assert!(answer.description.ends_with("..."));
    }

    #[test]
    fn help_mentions_bot_username() {
        let answer = Outcome::Help.into_answer("vibebot");
        assert!(answer.body.contains("@vibebot IPv6"));
    }

    #[test]
    fn rate_limit_answer_carries_reason() {
        let answer = Outcome::RateLimited {
            reason: "Daily API limit exceeded".into(),
        }
        .into_answer("vibebot");
        assert_eq!(answer.description, "Daily API limit exceeded");
        assert!(answer.body.ends_with("Daily API limit exceeded"));
    }
}
