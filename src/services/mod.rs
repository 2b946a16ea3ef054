pub mod image_gen;
pub mod image_host;
pub mod mailer;
pub mod rate_limit;
pub mod storage;
