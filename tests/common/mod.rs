//! In-memory fakes of the external services and router helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use genimage::app_state::{AppState, RequestSettings};
use genimage::db::{JobStore, StoreError};
use genimage::models::generation::ApprovalRequest;
use genimage::models::job::{GenImageJob, JobStatus};
use genimage::routes;
use genimage::services::image_gen::{ImageGenError, ImageGenerator};
use genimage::services::image_host::{object_name, ImageHost, ImageHostError};
use genimage::services::mailer::{MailError, Notifier};
use genimage::services::rate_limit::RateLimiter;

pub const SECRET: &str = "secret";
pub const GENERATED_URL: &str = "https://images.example/generated/a-cat.png";
pub const BUCKET_BASE: &str = "https://storage.googleapis.com/gen-images";
pub const APPROVERS: [&str; 2] = ["one@example.com", "two@example.com"];

/// Job store holding records in a map. Promotion happens under one lock.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, GenImageJob>>,
    /// Make every promotion fail as if the transaction was rolled back.
    pub fail_promotion: bool,
}

impl MemoryJobStore {
    pub fn all(&self) -> Vec<GenImageJob> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<GenImageJob> {
        self.jobs.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, job: GenImageJob) {
        self.jobs.lock().unwrap().insert(job.key.clone(), job);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, identity: &str, prompt: &str) -> Result<GenImageJob, StoreError> {
        let job = GenImageJob::new(identity, prompt, Utc::now());
        self.insert(job.clone());
        Ok(job)
    }

    async fn promote_job(&self, identity: &str, image_url: &str) -> Result<GenImageJob, StoreError> {
        if self.fail_promotion {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut jobs = self.jobs.lock().unwrap();
        let current = jobs
            .remove(identity)
            .ok_or_else(|| StoreError::NotFound(identity.to_string()))?;
        let promoted = current.promoted(image_url, Utc::now());
        jobs.insert(promoted.key.clone(), promoted.clone());
        Ok(promoted)
    }

    async fn mark_failed(&self, key: &str, reason: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        job.status = JobStatus::Failed;
        job.error = Some(reason.to_string());
        job.modify_time = Utc::now();
        Ok(())
    }

    async fn most_recent_job(&self, identity: &str) -> Result<Option<GenImageJob>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.email == identity)
            .max_by_key(|job| job.modify_time)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Image API returning a fixed URL, or failing on demand.
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ImageGenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ImageGenError::Api {
                status: 429,
                message: "Billing hard limit has been reached".to_string(),
            });
        }
        Ok(GENERATED_URL.to_string())
    }
}

/// Host that names objects the way the bucket host does, without I/O.
#[derive(Default)]
pub struct FakeHost {
    pub sources: Mutex<Vec<String>>,
}

pub fn hosted_url(source_url: &str) -> String {
    format!("{BUCKET_BASE}/{}", object_name(source_url))
}

#[async_trait]
impl ImageHost for FakeHost {
    async fn rehost(&self, source_url: &str) -> Result<String, ImageHostError> {
        self.sources.lock().unwrap().push(source_url.to_string());
        Ok(hosted_url(source_url))
    }
}

/// Notifier recording every approval it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<ApprovalRequest>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<ApprovalRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_approval(&self, approval: &ApprovalRequest) -> Result<usize, MailError> {
        if self.fail {
            return Err(MailError::Build("relay refused connection".to_string()));
        }
        self.sent.lock().unwrap().push(approval.clone());
        Ok(approval.approvers.len())
    }
}

pub struct TestApp {
    pub router: Router,
    pub jobs: Arc<MemoryJobStore>,
    pub generator: Arc<FakeGenerator>,
    pub host: Arc<FakeHost>,
    pub notifier: Arc<RecordingNotifier>,
}

#[derive(Default, Clone, Copy)]
pub struct Failures {
    pub generation: bool,
    pub promotion: bool,
    pub notification: bool,
}

pub fn build_test_app(rate_limit_per_minute: u32) -> TestApp {
    build_test_app_with(rate_limit_per_minute, Failures::default())
}

/// Build the router with the production middleware stack over fakes.
pub fn build_test_app_with(rate_limit_per_minute: u32, failures: Failures) -> TestApp {
    let jobs = Arc::new(MemoryJobStore {
        fail_promotion: failures.promotion,
        ..MemoryJobStore::default()
    });
    let generator = Arc::new(FakeGenerator {
        calls: AtomicUsize::new(0),
        fail: failures.generation,
    });
    let host = Arc::new(FakeHost::default());
    let notifier = Arc::new(RecordingNotifier {
        sent: Mutex::new(Vec::new()),
        fail: failures.notification,
    });

    let state = AppState::new(
        jobs.clone(),
        generator.clone(),
        host.clone(),
        notifier.clone(),
        RateLimiter::new(rate_limit_per_minute),
        RequestSettings {
            secret_key: SECRET.to_string(),
            approvers: APPROVERS.iter().map(|a| a.to_string()).collect(),
            project: Some("genimage-test".to_string()),
        },
    );

    TestApp {
        router: routes::with_layers(routes::router(state)),
        jobs,
        generator,
        host,
        notifier,
    }
}

pub async fn send(app: &Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn send_request(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Request URI with the three generation parameters form-encoded.
pub fn query(key: &str, prompt: &str, email: &str) -> String {
    let params = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("key", key)
        .append_pair("prompt", prompt)
        .append_pair("email", email)
        .finish();
    format!("/?{params}")
}
