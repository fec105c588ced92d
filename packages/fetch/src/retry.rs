//! HTTP retry helper for transient errors.
//!
//! The reporting client sends every request through [`send_json`]
//! instead of calling `reqwest::RequestBuilder::send()` directly, so
//! each call gets automatic retry with exponential backoff for
//! transient failures (timeouts, connection resets, server errors,
//! rate limiting).

use std::time::Duration;

use crate::FetchError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait
/// before giving up is 62 seconds.
const MAX_RETRIES: u32 = 5;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// Retries connection errors, timeouts, HTTP 429, and HTTP 5xx up to
/// [`MAX_RETRIES`] times. Other 4xx statuses are permanent and fail
/// immediately.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails after all retries, the
/// server returns a non-retryable status code, or the response body
/// cannot be parsed as JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt); // 2s, 4s, 8s
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("  transient error: {e}");
                    continue;
                }
                return Err(FetchError::Http(e));
            }
        };

        let status = response.status();

        // 429 and 5xx are worth retrying; other 4xx are permanent.
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if attempt < MAX_RETRIES {
                log::warn!("  HTTP {status}");
                continue;
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: format!("HTTP {status} after {MAX_RETRIES} retries"),
            });
        }
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        return Ok(response.json().await?);
    }

    unreachable!("retry loop exited without returning")
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
