// 查询分发入口
// 通道事件 → 防抖 → 处理流程 → 投递回答

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::debounce::{Debouncer, QueryHandler};
use crate::pipeline::QueryPipeline;
use crate::transport::{QueryEvent, Responder};

/// 防抖结束后运行处理流程并投递回答
struct PipelineHandler {
    pipeline: Arc<QueryPipeline>,
    responder: Arc<dyn Responder>,
    bot_username: String,
}

#[async_trait]
impl QueryHandler for PipelineHandler {
    async fn handle(&self, event: QueryEvent) {
        let outcome = self.pipeline.run(event.user_id, &event.query_text).await;
        let answer = outcome.into_answer(&self.bot_username);

        if let Err(e) = self.responder.deliver(&event.event_id, answer).await {
            tracing::error!(
                "Failed to deliver answer for query {} (user {}): {}",
                event.event_id,
                event.user_id,
                e
            );
        }
    }
}

pub struct QueryDispatcher {
    debouncer: Debouncer,
}

impl QueryDispatcher {
    pub fn new(
        pipeline: Arc<QueryPipeline>,
        responder: Arc<dyn Responder>,
        bot_username: impl Into<String>,
        debounce_delay: Duration,
    ) -> Self {
        let handler = Arc::new(PipelineHandler {
            pipeline,
            responder,
            bot_username: bot_username.into(),
        });
        Self {
            debouncer: Debouncer::new(debounce_delay, handler),
        }
    }

    /// 接收一条查询事件，回答稍后异步投递
    pub fn handle_query_event(&self, event: QueryEvent) {
        tracing::info!(
            "Received inline query {} from user {}: '{}'",
            event.event_id,
            event.user_id,
            event.query_text
        );
        self.debouncer.submit(event);
    }

    pub fn pending_users(&self) -> usize {
        self.debouncer.pending_users()
    }
}
