use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Size of every generated image.
pub const IMAGE_SIZE: &str = "1024x1024";

/// Text-to-image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for `prompt` and return a URL it can be fetched from.
    async fn generate(&self, prompt: &str) -> Result<String, ImageGenError>;
}

/// Client for an OpenAI-compatible image generation API.
pub struct OpenAiImageClient {
    http: Client,
    api_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'static str,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiImageClient {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self::with_client(Client::new(), api_base, api_key)
    }

    pub fn with_client(http: Client, api_base: &str, api_key: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, ImageGenError> {
        let url = format!("{}/images/generations", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ImageGenerationRequest {
                prompt,
                n: 1,
                size: IMAGE_SIZE,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(ImageGenError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let generated: ImageGenerationResponse = response.json().await?;

        generated
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or(ImageGenError::EmptyResponse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Image API returned no image URL")]
    EmptyResponse,
}
