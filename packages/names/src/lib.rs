#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Variable name resolution.
//!
//! Maps between display names (e.g. `"Device Category"`) and API codes
//! (e.g. `"ga:deviceCategory"`) through a persistent local cache, seeded
//! lazily from a static remote reference dataset and optionally extended
//! with an account's custom dimensions and metrics.

pub mod cache;
pub mod custom;

use std::path::Path;
use std::sync::LazyLock;

use ga_query_models::{ResolvedVariable, VariableKind};
use regex::Regex;
use serde::Deserialize;

pub use cache::NameCache;
pub use custom::{CustomFieldSource, HttpCustomFieldSource};

/// API code of the synthetic segment dimension.
pub const SEGMENT_API_CODE: &str = "ga:segment";

/// Static reference dataset listing the standard dimensions and metrics.
pub const REFERENCE_DATASET_URL: &str = "https://rrwielema.github.io/page/apis/ga_vars.json";

static GENERIC_CUSTOM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ga:(dimension|metric)([0-9]+)$").expect("valid regex"));

/// Errors from variable name resolution.
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    /// A display name has no entry in the cache.
    #[error("'{name}' is not a valid variable name")]
    UnknownName {
        /// The unresolvable display name.
        name: String,
    },

    /// An API code has no entry in the cache.
    #[error("'{code}' is not a valid API code")]
    UnknownApiCode {
        /// The unresolvable API code.
        code: String,
    },

    /// The cache already holds custom entries and `overwrite` was not set.
    #[error(
        "the cache already contains custom dimensions and/or metrics; \
         pass overwrite to replace them"
    )]
    DuplicateCustomCatalog,

    /// A property id did not match the `UA-XXXXXXXX-X(X)` format.
    #[error("'{property_id}' is not a valid property ID in format UA-XXXXXXXX-X(X)")]
    InvalidPropertyId {
        /// The offending property id.
        property_id: String,
    },

    /// Cache access failed.
    #[error("name cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error creating the cache location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves display names and API codes against the local cache.
#[derive(Debug)]
pub struct VariableNameResolver {
    cache: NameCache,
    has_custom: bool,
}

impl VariableNameResolver {
    /// Opens the resolver over the cache at `path`, seeding it from the
    /// remote reference dataset if it has never been built.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the cache cannot be opened or the
    /// reference dataset cannot be fetched.
    pub async fn open(path: &Path) -> Result<Self, NameError> {
        let mut resolver = Self::from_cache(NameCache::open(path)?)?;
        resolver.ensure_seeded().await?;
        Ok(resolver)
    }

    /// Wraps an already-opened cache without seeding it.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the cache cannot be queried.
    pub fn from_cache(cache: NameCache) -> Result<Self, NameError> {
        let has_custom = cache.has_custom_entries()?;
        Ok(Self { cache, has_custom })
    }

    /// An in-memory resolver seeded with the given records, for tests and
    /// offline use.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the cache cannot be created.
    pub fn in_memory(records: &[ResolvedVariable]) -> Result<Self, NameError> {
        let cache = NameCache::open_in_memory()?;
        cache.insert(records)?;
        Self::from_cache(cache)
    }

    /// Fetches the reference dataset and seeds the cache, if it is empty.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the fetch or the insert fails.
    pub async fn ensure_seeded(&mut self) -> Result<(), NameError> {
        if !self.cache.is_empty()? {
            return Ok(());
        }
        log::info!("name cache is empty; seeding from {REFERENCE_DATASET_URL}");
        let records = fetch_reference_dataset().await?;
        self.seed_with(&records)
    }

    /// Replaces the cache contents with the given records.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if the insert fails.
    pub fn seed_with(&mut self, records: &[ResolvedVariable]) -> Result<(), NameError> {
        self.cache.replace_all(records)?;
        self.has_custom = self.cache.has_custom_entries()?;
        Ok(())
    }

    /// Resolves each name to its full record.
    ///
    /// Names may be API codes (`ga:` prefix) or display names, mixed
    /// freely. Resolution is idempotent and case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::UnknownApiCode`] or [`NameError::UnknownName`]
    /// for the first name with no cache entry.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ResolvedVariable>, NameError> {
        names.iter().map(|name| self.resolve_one(name.as_ref())).collect()
    }

    /// Resolves each name to just its API code.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn api_codes<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, NameError> {
        Ok(self.resolve(names)?.into_iter().map(|r| r.api_code).collect())
    }

    /// Resolves each name to just its display name.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn display_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>, NameError> {
        Ok(self.resolve(names)?.into_iter().map(|r| r.name).collect())
    }

    /// Pulls the account's custom dimensions and metrics from `source`
    /// and appends them to the cache.
    ///
    /// Re-extension is refused unless `overwrite` is set, in which case
    /// the previous custom entries are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::DuplicateCustomCatalog`] when custom entries
    /// already exist and `overwrite` is false, or any listing/cache
    /// failure.
    pub async fn extend_with_custom(
        &mut self,
        source: &dyn CustomFieldSource,
        property_id: &str,
        overwrite: bool,
    ) -> Result<(), NameError> {
        custom::account_id_of(property_id)?;

        if self.has_custom && !overwrite {
            return Err(NameError::DuplicateCustomCatalog);
        }

        let records = source.list_custom_fields(property_id).await?;
        if overwrite {
            self.cache.remove_custom_entries()?;
        }
        log::info!(
            "adding {} custom field(s) from property {property_id} to the name cache",
            records.len()
        );
        self.cache.insert(&records)?;
        self.has_custom = self.cache.has_custom_entries()?;
        Ok(())
    }

    fn resolve_one(&self, name: &str) -> Result<ResolvedVariable, NameError> {
        if name == SEGMENT_API_CODE || name == "Segment" {
            return Ok(segment_variable());
        }

        // Accounts that never registered their custom fields still query
        // them by generic code; synthesize a display name for those.
        if !self.has_custom
            && let Some(captures) = GENERIC_CUSTOM_RE.captures(name)
        {
            let index = &captures[2];
            let (kind, label) = if &captures[1] == "dimension" {
                (VariableKind::Dimension, "Dimension")
            } else {
                (VariableKind::Metric, "Metric")
            };
            return Ok(ResolvedVariable {
                name: format!("{label} {index}"),
                kind,
                api_code: name.to_owned(),
            });
        }

        if name.starts_with("ga:") {
            self.cache
                .lookup_by_api_code(name)?
                .ok_or_else(|| NameError::UnknownApiCode {
                    code: name.to_owned(),
                })
        } else {
            self.cache
                .lookup_by_name(name)?
                .ok_or_else(|| NameError::UnknownName {
                    name: name.to_owned(),
                })
        }
    }
}

/// The fixed synthetic segment dimension record.
#[must_use]
pub fn segment_variable() -> ResolvedVariable {
    ResolvedVariable {
        name: "Segment".to_owned(),
        kind: VariableKind::Dimension,
        api_code: SEGMENT_API_CODE.to_owned(),
    }
}

/// Fetches the standard dimension/metric catalog from the reference
/// dataset.
///
/// # Errors
///
/// Returns [`NameError::Http`] if the fetch or parse fails.
pub async fn fetch_reference_dataset() -> Result<Vec<ResolvedVariable>, NameError> {
    let document: ReferenceDataset = reqwest::get(REFERENCE_DATASET_URL)
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(document
        .data
        .into_iter()
        .map(|record| ResolvedVariable {
            name: record.name,
            kind: record.kind,
            api_code: record.apicode,
        })
        .collect())
}

/// Wire shape of the reference dataset document.
#[derive(Debug, Deserialize)]
struct ReferenceDataset {
    data: Vec<ReferenceRecord>,
}

#[derive(Debug, Deserialize)]
struct ReferenceRecord {
    name: String,
    #[serde(rename = "type")]
    kind: VariableKind,
    apicode: String,
}
