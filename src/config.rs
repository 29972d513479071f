//! Support for library configuration options

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::Lazy;

/// Root of the planner REST API (the `tasks` endpoints live under it).
/// Feel free to override it when initing this library.
pub static API_BASE_URL: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("http://localhost:8080/api/v1".to_string())));

/// How long a single HTTP request may take before it is considered failed.
/// A timeout is reported as any other remote failure, and triggers a rollback.
pub static REQUEST_TIMEOUT: Lazy<Arc<Mutex<Duration>>> = Lazy::new(|| Arc::new(Mutex::new(Duration::from_secs(10))));

/// Prefix of the identifiers given to tasks that the server has not acknowledged yet.
pub static TEMPORARY_ID_PREFIX: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("tmp-".to_string())));


pub fn api_base_url() -> String {
    API_BASE_URL.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn request_timeout() -> Duration {
    *REQUEST_TIMEOUT.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn temporary_id_prefix() -> String {
    TEMPORARY_ID_PREFIX.lock().unwrap_or_else(PoisonError::into_inner).clone()
}
