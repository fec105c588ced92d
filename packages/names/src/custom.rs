//! Account-specific custom dimension and metric listing.
//!
//! The resolver only needs "list the custom fields registered on a
//! property", so that is the whole trait. The HTTP implementation talks
//! to the management API; tests substitute a canned source.

use async_trait::async_trait;
use ga_query_models::{ResolvedVariable, VariableKind};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::NameError;

/// Management API base URL for custom field listings.
pub const MANAGEMENT_BASE_URL: &str = "https://www.googleapis.com/analytics/v3/management";

static PROPERTY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UA-[0-9]{8}-[0-9]{1,2}$").expect("valid regex"));

/// Source of an account's registered custom dimensions and metrics.
#[async_trait]
pub trait CustomFieldSource: Send + Sync {
    /// Lists the custom dimensions and metrics registered on the given
    /// property, as cache-ready records.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the listing cannot be fetched.
    async fn list_custom_fields(
        &self,
        property_id: &str,
    ) -> Result<Vec<ResolvedVariable>, NameError>;
}

/// Validates a `UA-XXXXXXXX-X(X)` property id and returns the embedded
/// account id.
///
/// # Errors
///
/// Returns [`NameError::InvalidPropertyId`] if the format does not match.
pub fn account_id_of(property_id: &str) -> Result<&str, NameError> {
    if !PROPERTY_ID_RE.is_match(property_id) {
        return Err(NameError::InvalidPropertyId {
            property_id: property_id.to_owned(),
        });
    }
    property_id
        .split('-')
        .nth(1)
        .ok_or_else(|| NameError::InvalidPropertyId {
            property_id: property_id.to_owned(),
        })
}

/// HTTP implementation of [`CustomFieldSource`] against the management
/// API.
#[derive(Debug)]
pub struct HttpCustomFieldSource {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpCustomFieldSource {
    /// Creates a source authenticated with the given bearer token.
    #[must_use]
    pub fn new(access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: MANAGEMENT_BASE_URL.to_owned(),
            access_token: access_token.to_owned(),
        }
    }

    /// Overrides the management API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_owned();
        self
    }

    async fn list(&self, url: &str) -> Result<Vec<CustomFieldItem>, NameError> {
        let listing: CustomFieldListing = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing.items)
    }
}

#[async_trait]
impl CustomFieldSource for HttpCustomFieldSource {
    async fn list_custom_fields(
        &self,
        property_id: &str,
    ) -> Result<Vec<ResolvedVariable>, NameError> {
        let account = account_id_of(property_id)?;
        let base = format!(
            "{}/accounts/{account}/webproperties/{property_id}",
            self.base_url
        );

        let mut items = self.list(&format!("{base}/customDimensions")).await?;
        items.extend(self.list(&format!("{base}/customMetrics")).await?);

        Ok(items.into_iter().map(CustomFieldItem::into_record).collect())
    }
}

/// Wire shape of a management API custom field listing.
#[derive(Debug, Default, Deserialize)]
struct CustomFieldListing {
    #[serde(default)]
    items: Vec<CustomFieldItem>,
}

#[derive(Debug, Deserialize)]
struct CustomFieldItem {
    id: String,
    name: String,
    #[serde(default)]
    kind: String,
}

impl CustomFieldItem {
    fn into_record(self) -> ResolvedVariable {
        let kind = if self.kind.contains("Dimension") {
            VariableKind::CustomDimension
        } else {
            VariableKind::CustomMetric
        };
        ResolvedVariable {
            name: self.name,
            kind,
            api_code: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_property_id_yields_account_id() {
        assert_eq!(account_id_of("UA-12345678-1").unwrap(), "12345678");
        assert_eq!(account_id_of("UA-87654321-12").unwrap(), "87654321");
    }

    #[test]
    fn malformed_property_ids_are_rejected() {
        for id in ["UA-1234-1", "12345678-1", "UA-12345678", "UA-12345678-123", "ua-12345678-1"] {
            assert!(
                matches!(account_id_of(id), Err(NameError::InvalidPropertyId { .. })),
                "expected rejection for {id}"
            );
        }
    }

    #[test]
    fn listing_items_map_to_custom_kinds() {
        let dimension = CustomFieldItem {
            id: "ga:dimension3".to_owned(),
            name: "Author".to_owned(),
            kind: "analytics#customDimension".to_owned(),
        }
        .into_record();
        assert_eq!(dimension.kind, VariableKind::CustomDimension);
        assert_eq!(dimension.api_code, "ga:dimension3");

        let metric = CustomFieldItem {
            id: "ga:metric1".to_owned(),
            name: "Word Count".to_owned(),
            kind: "analytics#customMetric".to_owned(),
        }
        .into_record();
        assert_eq!(metric.kind, VariableKind::CustomMetric);
    }
}
