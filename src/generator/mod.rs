// 内容生成
// 外部文本生成服务的抽象，核心流程只依赖 ContentGenerator

pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiGenerator;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("provider returned no text")]
    Empty,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// 生成关于 `topic` 的一段文本，长度目标为 `min_length..=max_length` 个字符
    async fn generate(
        &self,
        topic: &str,
        min_length: usize,
        max_length: usize,
    ) -> Result<String, GenerationError>;
}
