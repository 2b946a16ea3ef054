use axum::extract::{RawQuery, State};
use chrono::Utc;
use std::time::Instant;

use crate::app_state::AppState;
use crate::db::StoreError;
use crate::error::{AppError, AppResult};
use crate::models::generation::{ApprovalRequest, GenImageQuery, GenImageRequest};

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded, and please wait for 30s!";
pub const ACCEPTED_MESSAGE: &str = "Please check your email!";

fn record_outcome(outcome: &'static str) {
    metrics::counter!("genimage_requests_total", "outcome" => outcome).increment(1);
}

/// ANY / — generate an image and email it to the approvers.
pub async fn generate_image(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> AppResult<&'static str> {
    let query = GenImageQuery::from_query_string(raw.as_deref());
    let request = query.into_request().map_err(|msg| {
        record_outcome("invalid");
        AppError::Validation(msg)
    })?;

    tracing::info!(email = %request.email, "Image generation requested");

    if request.key != state.settings.secret_key {
        record_outcome("unauthorized");
        tracing::warn!(email = %request.email, "Rejected request with wrong key");
        return Err(AppError::Unauthorized);
    }

    let decision = state
        .rate_limiter
        .check(state.jobs.as_ref(), &request.email, Utc::now())
        .await?;
    if decision.is_exceeded() {
        record_outcome("rate_limited");
        tracing::info!(email = %request.email, ?decision, "Rate limit exceeded");
        return Ok(RATE_LIMITED_MESSAGE);
    }

    let start = Instant::now();
    match process(&state, &request).await {
        Ok(()) => {
            record_outcome("accepted");
            metrics::histogram!("genimage_processing_seconds").record(start.elapsed().as_secs_f64());
            Ok(ACCEPTED_MESSAGE)
        }
        Err(e) => {
            record_outcome("failed");
            Err(e)
        }
    }
}

/// Job creation through notification, in order.
async fn process(state: &AppState, request: &GenImageRequest) -> AppResult<()> {
    let job = state.jobs.create_job(&request.email, &request.prompt).await?;
    tracing::info!(email = %request.email, job = %job.key, "Job created");

    let public_url = match produce_image(state, &request.prompt).await {
        Ok(url) => url,
        Err(e) => {
            mark_failed(state, &job.key, &e).await;
            return Err(e);
        }
    };

    let job = match state.jobs.promote_job(&request.email, &public_url).await {
        Ok(job) => job,
        // Another request already moved or replaced the record.
        Err(e @ StoreError::NotFound(_)) => return Err(e.into()),
        Err(e) => {
            let e = AppError::from(e);
            mark_failed(state, &job.key, &e).await;
            return Err(e);
        }
    };
    tracing::info!(job = %job.key, public_url = %public_url, "Job waiting for approval");

    let approval = ApprovalRequest::new(request, &public_url, state.settings.approvers.clone());
    let sent = state.notifier.send_approval(&approval).await.map_err(|e| {
        tracing::error!(job = %job.key, error = %e, "Approval email failed");
        AppError::from(e)
    })?;
    tracing::info!(job = %job.key, sent, "Approval emails dispatched");

    Ok(())
}

/// Keep a job that will not complete from looking like it is still
/// generating. Best effort: a failure here is only logged.
async fn mark_failed(state: &AppState, key: &str, cause: &AppError) {
    if let Err(store_err) = state.jobs.mark_failed(key, &cause.to_string()).await {
        tracing::error!(job = %key, error = %store_err, "Failed to mark job as failed");
    }
}

async fn produce_image(state: &AppState, prompt: &str) -> AppResult<String> {
    let image_url = state.images.generate(prompt).await?;
    tracing::debug!(image_url = %image_url, "Image generated");

    let public_url = state.hosting.rehost(&image_url).await?;
    Ok(public_url)
}
