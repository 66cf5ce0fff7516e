use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::{InlineAnswer, QueryEvent, Responder, TransportError};
use crate::dispatch::QueryDispatcher;

// 长轮询超时，单位秒
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub inline_query: Option<InlineQuery>,
}

#[derive(Debug, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl From<InlineQuery> for QueryEvent {
    fn from(query: InlineQuery) -> Self {
        QueryEvent {
            event_id: query.id,
            user_id: query.from.id,
            query_text: query.query,
        }
    }
}

#[derive(Debug, Serialize)]
struct InputTextMessageContent<'a> {
    message_text: &'a str,
}

#[derive(Debug, Serialize)]
struct InlineQueryResultArticle<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: String,
    title: &'a str,
    description: &'a str,
    input_message_content: InputTextMessageContent<'a>,
}

#[derive(Debug, Serialize)]
struct AnswerInlineQuery<'a> {
    inline_query_id: &'a str,
    results: Vec<InlineQueryResultArticle<'a>>,
    cache_time: u32,
}

fn answer_payload<'a>(event_id: &'a str, answer: &'a InlineAnswer) -> AnswerInlineQuery<'a> {
    AnswerInlineQuery {
        inline_query_id: event_id,
        results: vec![InlineQueryResultArticle {
            kind: "article",
            id: Uuid::new_v4().to_string(),
            title: &answer.title,
            description: &answer.description,
            input_message_content: InputTextMessageContent {
                message_text: &answer.body,
            },
        }],
        cache_time: answer.cache_seconds,
    }
}

/// Telegram Bot API 通道：长轮询 inline query 并回答
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    async fn call<T, B>(&self, method: &str, body: &B) -> Result<T, TransportError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.base_url, method);
        let response: BotApiResponse<T> = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .json()
            .await?;

        match response {
            BotApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            BotApiResponse { description, .. } => Err(TransportError::Rejected(
                description.unwrap_or_else(|| format!("{} failed", method)),
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["inline_query"],
            }),
        )
        .await
    }

    /// 丢弃启动前积压的更新，返回轮询起始 offset
    pub async fn skip_pending_updates(&self) -> Result<i64, TransportError> {
        // offset = -1 只返回最新一条，之后用它的 id + 1 确认全部积压
        let latest: Vec<Update> = self
            .call(
                "getUpdates",
                &serde_json::json!({
                    "offset": -1,
                    "timeout": 0,
                    "allowed_updates": ["inline_query"],
                }),
            )
            .await?;
        Ok(next_offset(0, &latest))
    }

    /// 轮询循环，直到任务被取消
    pub async fn run(&self, dispatcher: &QueryDispatcher) {
        let mut offset = match self.skip_pending_updates().await {
            Ok(offset) => {
                if offset > 0 {
                    tracing::info!("Dropped pending updates up to {}", offset - 1);
                }
                offset
            }
            Err(e) => {
                tracing::warn!("Failed to drop pending updates: {}", e);
                0
            }
        };
        tracing::info!("Telegram polling started");

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!("Failed to poll updates: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            offset = next_offset(offset, &updates);
            for update in updates {
                if let Some(query) = update.inline_query {
                    tracing::debug!(
                        "Inline query {} from {} ({:?})",
                        query.id,
                        query.from.id,
                        query.from.username
                    );
                    dispatcher.handle_query_event(query.into());
                }
            }
        }
    }
}

fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id + 1)
        .fold(current, i64::max)
}

#[async_trait]
impl Responder for TelegramTransport {
    async fn deliver(&self, event_id: &str, answer: InlineAnswer) -> Result<(), TransportError> {
        let payload = answer_payload(event_id, &answer);
        let _: bool = self.call("answerInlineQuery", &payload).await?;
        Ok(())
    }
}
