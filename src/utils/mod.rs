// Logging setup and retry helpers

pub mod logger;
pub mod retry;

pub use logger::init_tracing;
pub use retry::{with_retry, Backoff, RetryError};
