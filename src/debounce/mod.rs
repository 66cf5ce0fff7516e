// 按用户防抖
// 每个用户最多一个待执行查询，新查询取消尚未触发的旧查询

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::transport::QueryEvent;

/// 防抖结束后处理查询
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn handle(&self, event: QueryEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingState {
    /// 定时器未触发，可以取消
    Scheduled,
    /// 已交给处理流程，不再取消
    Running,
}

struct PendingQuery {
    ticket: u64,
    query_id: String,
    state: PendingState,
    handle: JoinHandle<()>,
}

type PendingMap = HashMap<i64, PendingQuery>;

#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<PendingMap>>,
    next_ticket: Arc<AtomicU64>,
    handler: Arc<dyn QueryHandler>,
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Debouncer {
    pub fn new(delay: Duration, handler: Arc<dyn QueryHandler>) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: Arc::new(AtomicU64::new(1)),
            handler,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 提交查询：同步取消该用户尚未触发的查询，再登记新的延迟执行
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn submit(&self, event: QueryEvent) {
        let user_id = event.user_id;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let mut pending = lock(&self.pending);

        if let Some(previous) = pending.remove(&user_id) {
            match previous.state {
                PendingState::Scheduled => {
                    previous.handle.abort();
                    tracing::debug!(
                        "Cancelled query {} for user {} (superseded by {})",
                        previous.query_id,
                        user_id,
                        event.event_id
                    );
                }
                PendingState::Running => {
                    tracing::debug!(
                        "Query {} for user {} already running, scheduling {} separately",
                        previous.query_id,
                        user_id,
                        event.event_id
                    );
                }
            }
        }

        let query_id = event.event_id.clone();
        let handle = tokio::spawn(Self::fire(
            self.delay,
            self.pending.clone(),
            self.handler.clone(),
            ticket,
            event,
        ));

        pending.insert(
            user_id,
            PendingQuery {
                ticket,
                query_id,
                state: PendingState::Scheduled,
                handle,
            },
        );
    }

    async fn fire(
        delay: Duration,
        pending: Arc<Mutex<PendingMap>>,
        handler: Arc<dyn QueryHandler>,
        ticket: u64,
        event: QueryEvent,
    ) {
        tokio::time::sleep(delay).await;

        let user_id = event.user_id;
        {
            let mut map = lock(&pending);
            match map.get_mut(&user_id) {
                Some(entry) if entry.ticket == ticket => entry.state = PendingState::Running,
                // 已被更新的查询取代
                _ => return,
            }
        }

        tracing::info!(
            "Processing debounced query {} from user {}",
            event.event_id,
            user_id
        );
        handler.handle(event).await;

        let mut map = lock(&pending);
        if map.get(&user_id).is_some_and(|entry| entry.ticket == ticket) {
            map.remove(&user_id);
        }
    }

    /// 已登记（待触发或执行中）的用户数
    pub fn pending_users(&self) -> usize {
        lock(&self.pending).len()
    }

    /// 该用户是否有尚未触发的查询
    pub fn is_scheduled(&self, user_id: i64) -> bool {
        lock(&self.pending)
            .get(&user_id)
            .is_some_and(|entry| entry.state == PendingState::Scheduled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<QueryEvent>>,
    }

    #[async_trait]
    impl QueryHandler for Recorder {
        async fn handle(&self, event: QueryEvent) {
            self.seen.lock().unwrap().push(event);
        }
    }

    fn event(user_id: i64, id: &str, text: &str) -> QueryEvent {
        QueryEvent {
            event_id: id.to_string(),
            user_id,
            query_text: text.to_string(),
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_submissions_collapse_to_last() {
        let recorder = Arc::new(Recorder::default());
        let debouncer = Debouncer::new(Duration::from_secs(2), recorder.clone());

        for (i, text) in ["r", "ru", "rus", "rust"].iter().enumerate() {
            debouncer.submit(event(1, &format!("q{}", i), text));
            tokio::time::sleep(ms(300)).await;
        }
        assert!(debouncer.is_scheduled(1));

        tokio::time::sleep(Duration::from_secs(3)).await;

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query_text, "rust");
        assert_eq!(seen[0].event_id, "q3");
        assert_eq!(debouncer.pending_users(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn users_are_debounced_independently() {
        let recorder = Arc::new(Recorder::default());
        let debouncer = Debouncer::new(Duration::from_secs(2), recorder.clone());

        for user in 1..=5 {
            debouncer.submit(event(user, &format!("a{}", user), "first"));
        }
        tokio::time::sleep(ms(500)).await;
        for user in 1..=5 {
            debouncer.submit(event(user, &format!("b{}", user), &format!("latest-{}", user)));
        }
        assert_eq!(debouncer.pending_users(), 5);

        tokio::time::sleep(Duration::from_secs(3)).await;

        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort_by_key(|e| e.user_id);
        assert_eq!(seen.len(), 5);
        for (i, e) in seen.iter().enumerate() {
            assert_eq!(e.user_id, i as i64 + 1);
            assert_eq!(e.query_text, format!("latest-{}", e.user_id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_further_apart_than_delay_both_run() {
        let recorder = Arc::new(Recorder::default());
        let debouncer = Debouncer::new(Duration::from_secs(2), recorder.clone());

        debouncer.submit(event(1, "q1", "one"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        debouncer.submit(event(1, "q2", "two"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        let texts: Vec<String> = recorder
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.query_text.clone())
            .collect();
        assert_eq!(texts, vec!["one".to_string(), "two".to_string()]);
    }

    /// 处理过程中阻塞，直到测试放行
    struct Gate {
        started: Notify,
        release: Notify,
        finished: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryHandler for Gate {
        async fn handle(&self, event: QueryEvent) {
            self.started.notify_one();
            self.release.notified().await;
            self.finished.lock().unwrap().push(event.query_text);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn running_query_is_not_cancelled_by_new_submission() {
        let gate = Arc::new(Gate {
            started: Notify::new(),
            release: Notify::new(),
            finished: Mutex::new(Vec::new()),
        });
        let debouncer = Debouncer::new(Duration::from_secs(2), gate.clone());

        debouncer.submit(event(1, "q1", "first"));
        gate.started.notified().await;
        assert!(!debouncer.is_scheduled(1));

        // 第一条仍在执行，第二条独立调度
        debouncer.submit(event(1, "q2", "second"));
        assert!(debouncer.is_scheduled(1));
        gate.release.notify_one();

        gate.started.notified().await;
        gate.release.notify_one();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let finished = gate.finished.lock().unwrap().clone();
        assert_eq!(finished, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(debouncer.pending_users(), 0);
    }
}
