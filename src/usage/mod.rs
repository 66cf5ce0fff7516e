// 使用日志记录
// 写入由后台任务完成，调用方只负责投递，不等待写入结果

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::database::{Store, UsageLogEntry};

// 队列上限，存储卡住时超出部分直接丢弃
const QUEUE_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct UsageRecorder {
    tx: mpsc::Sender<UsageLogEntry>,
}

impl UsageRecorder {
    /// 启动后台写入任务；所有 `UsageRecorder` 被释放后任务写完剩余日志并退出
    pub fn spawn(store: Arc<dyn Store>) -> (Self, JoinHandle<()>) {
        Self::with_capacity(store, QUEUE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn Store>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<UsageLogEntry>(capacity);

        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = store.append_usage_log(&entry).await {
                    tracing::error!(
                        "Failed to write usage log for user {}: {}",
                        entry.user_id,
                        e
                    );
                }
            }
            tracing::debug!("Usage recorder stopped");
        });

        (Self { tx }, handle)
    }

    pub fn record(&self, user_id: i64, query: &str, response_length: usize, success: bool) {
        let entry = UsageLogEntry::new(user_id, query, response_length, success);
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Usage log queue is full, dropping log for user {}", user_id);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Usage recorder is closed, dropping log for user {}", user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    #[tokio::test]
    async fn drains_pending_entries_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, worker) = UsageRecorder::spawn(store.clone());

        recorder.record(1, "rust", 320, true);
        recorder.record(2, "go", 0, false);
        drop(recorder);
        worker.await.unwrap();

        let logs = store.usage_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].query, "rust");
        assert_eq!(logs[0].response_length, 320);
        assert!(!logs[1].success);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, worker) = UsageRecorder::with_capacity(store.clone(), 2);

        // 单线程运行时下写入任务尚未开始消费
        for user_id in 0..5 {
            recorder.record(user_id, "topic", 10, true);
        }
        drop(recorder);
        worker.await.unwrap();

        let logs = store.usage_logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].user_id, 0);
        assert_eq!(logs[1].user_id, 1);
    }
}
