use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::JobStore;
use crate::services::{
    image_gen::ImageGenerator, image_host::ImageHost, mailer::Notifier, rate_limit::RateLimiter,
};

/// Request-independent settings the handler consults.
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub secret_key: String,
    pub approvers: Vec<String>,
    pub project: Option<String>,
}

impl RequestSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            secret_key: config.secret_key.clone(),
            approvers: config.approvers(),
            project: config.gcp_project.clone(),
        }
    }
}

/// Shared application state passed to all route handlers.
///
/// Clients are built once at startup and reused by every request.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub images: Arc<dyn ImageGenerator>,
    pub hosting: Arc<dyn ImageHost>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: RateLimiter,
    pub settings: Arc<RequestSettings>,
}

impl AppState {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        images: Arc<dyn ImageGenerator>,
        hosting: Arc<dyn ImageHost>,
        notifier: Arc<dyn Notifier>,
        rate_limiter: RateLimiter,
        settings: RequestSettings,
    ) -> Self {
        Self {
            jobs,
            images,
            hosting,
            notifier,
            rate_limiter,
            settings: Arc::new(settings),
        }
    }
}
