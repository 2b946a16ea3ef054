use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between requester identity and image URL in promoted job keys.
pub const KEY_SEPARATOR: &str = "->";

/// Lifecycle status of an image generation job.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    GeneratingImage,
    WaitingForApproval,
    /// Generation or hosting failed after the job was created.
    Failed,
}

/// One image generation request.
///
/// A job starts out keyed by the requester's identity alone. Promotion
/// re-keys it to `identity->image_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenImageJob {
    pub key: String,
    pub email: String,
    pub prompt: String,
    pub status: JobStatus,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

/// Key of a job that has been promoted with the given image URL.
pub fn promoted_key(identity: &str, image_url: &str) -> String {
    format!("{identity}{KEY_SEPARATOR}{image_url}")
}

impl GenImageJob {
    /// A fresh job keyed by identity, in `GENERATING_IMAGE`.
    pub fn new(identity: &str, prompt: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: identity.to_string(),
            email: identity.to_string(),
            prompt: prompt.to_string(),
            status: JobStatus::GeneratingImage,
            image_url: None,
            error: None,
            create_time: now,
            modify_time: now,
        }
    }

    /// The record that replaces this one once its image is hosted.
    ///
    /// Prompt and creation time carry over.
    pub fn promoted(&self, image_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            key: promoted_key(&self.email, image_url),
            email: self.email.clone(),
            prompt: self.prompt.clone(),
            status: JobStatus::WaitingForApproval,
            image_url: Some(image_url.to_string()),
            error: None,
            create_time: self.create_time,
            modify_time: now,
        }
    }
}
