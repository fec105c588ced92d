//! Reporting API client.
//!
//! The runner only needs "send one batch request, get one batch
//! response", so that is the whole trait. The HTTP implementation talks
//! to the v4 reporting endpoint; tests substitute a scripted client.

use async_trait::async_trait;
use ga_query_models::wire::{BatchGetRequest, BatchGetResponse};

use crate::{FetchError, retry};

/// The v4 batch reporting endpoint.
pub const REPORTING_URL: &str = "https://analyticsreporting.googleapis.com/v4/reports:batchGet";

/// Transport seam between the runner and the reporting backend.
#[async_trait]
pub trait ReportingApi: Send + Sync {
    /// Executes one batch request and returns the decoded response.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the request fails or the response
    /// cannot be decoded.
    async fn batch_get(&self, request: &BatchGetRequest) -> Result<BatchGetResponse, FetchError>;
}

/// HTTP implementation of [`ReportingApi`] against the v4 endpoint.
#[derive(Debug)]
pub struct HttpReportingApi {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl HttpReportingApi {
    /// Creates a client authenticated with the given bearer token.
    #[must_use]
    pub fn new(access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: REPORTING_URL.to_owned(),
            access_token: access_token.to_owned(),
        }
    }

    /// Overrides the reporting endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_owned();
        self
    }
}

#[async_trait]
impl ReportingApi for HttpReportingApi {
    async fn batch_get(&self, request: &BatchGetRequest) -> Result<BatchGetResponse, FetchError> {
        let value = retry::send_json(|| {
            self.client
                .post(&self.url)
                .bearer_auth(&self.access_token)
                .json(request)
        })
        .await?;
        Ok(serde_json::from_value(value)?)
    }
}
