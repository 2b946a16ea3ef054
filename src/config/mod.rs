use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Bearer token for the image generation API
    pub openai_api_key: String,

    /// Base URL of the image generation API
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,

    /// Bucket generated images are re-hosted in
    pub image_bucket: String,

    /// S3-compatible storage endpoint
    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,

    #[serde(default = "default_storage_region")]
    pub storage_region: String,

    /// HMAC access key for the storage endpoint
    pub storage_access_key: String,

    /// HMAC secret for the storage endpoint
    pub storage_secret_key: String,

    /// Prefix of public object URLs, joined as `{base}/{bucket}/{name}`
    #[serde(default = "default_public_url_base")]
    pub public_url_base: String,

    /// Shared secret every request must present as `key`
    pub secret_key: String,

    /// Approver addresses (comma-separated in the environment)
    pub approver_emails: Vec<String>,

    /// Sender address, also used as the SMTP login
    pub gmail: String,

    /// SMTP application password for the sender
    pub app_password: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Base URL of the approval page linked from each email
    pub approval_url: String,

    /// Project identifier, reported in logs and health checks
    pub gcp_project: Option<String>,

    /// Accepted requests per minute per requester
    pub rate_limit_per_minute: u32,

    /// Max WAITING_FOR_APPROVAL records kept per requester; unset keeps all
    pub job_retention: Option<u32>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_openai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_storage_region() -> String {
    "auto".to_string()
}

fn default_public_url_base() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the request flow cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "RATE_LIMIT_PER_MINUTE must be at least 1".to_string(),
            ));
        }

        if self.approver_emails.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "APPROVER_EMAILS must name at least one approver".to_string(),
            ));
        }

        url::Url::parse(&self.approval_url)
            .map_err(|e| ConfigError::Invalid(format!("APPROVAL_URL is not a valid URL: {e}")))?;

        Ok(())
    }

    /// Approver addresses with surrounding whitespace and empty entries removed.
    pub fn approvers(&self) -> Vec<String> {
        self.approver_emails
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
