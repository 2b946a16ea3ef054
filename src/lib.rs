//! Image generation with emailed approval.
//!
//! A request names a prompt and a requester. The service rate-limits the
//! requester, generates an image through an external API, re-hosts it in
//! object storage, records the job, and mails an approval link to every
//! configured approver.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
