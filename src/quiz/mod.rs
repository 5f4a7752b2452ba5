pub mod engine;
pub mod error;
pub mod movies;
pub mod parts;
pub mod report;
pub mod round;
pub mod stats;
pub mod stress;

use async_trait::async_trait;

use self::error::SourceError;

/// A yes/no question. The player answers "yes" or "no" and the answer is
/// right when it matches `correct_answer`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    /// Opaque reference to an illustration (poster file name, etc.).
    pub media_ref: Option<String>,
    pub correct_answer: bool,
}

impl Question {
    pub fn new(text: impl Into<String>, correct_answer: bool) -> Self {
        Self {
            text: text.into(),
            media_ref: None,
            correct_answer,
        }
    }

    pub fn with_media(mut self, media_ref: impl Into<String>) -> Self {
        self.media_ref = Some(media_ref.into());
        self
    }
}

/// Supplies questions to a round on demand.
///
/// `Ok(None)` means the source has nothing more to give. A fetch that went
/// wrong must come back as `Err` so the engine can tell the two apart.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn request_next(&self) -> Result<Option<Question>, SourceError>;
}
