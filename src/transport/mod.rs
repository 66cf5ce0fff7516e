// 消息通道
// 查询事件的来源与回答的去向

pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use telegram::TelegramTransport;

/// 入站查询事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEvent {
    pub event_id: String,
    pub user_id: i64,
    pub query_text: String,
}

/// 出站回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAnswer {
    pub title: String,
    pub description: String,
    pub body: String,
    /// 客户端对同一查询的缓存时间，单位秒
    pub cache_seconds: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport rejected the call: {0}")]
    Rejected(String),
}

/// 将回答投递回消息通道
#[async_trait]
pub trait Responder: Send + Sync {
    async fn deliver(&self, event_id: &str, answer: InlineAnswer) -> Result<(), TransportError>;
}
