//! Error taxonomy for metric queries
//!
//! Every failure aborts the whole query and is surfaced unchanged to the
//! HTTP layer, which maps it onto a Kubernetes `Status` response.

use thiserror::Error;

/// Errors returned by the metrics providers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Listing cluster nodes failed
    #[error("node inventory unavailable: {0}")]
    InventoryUnavailable(String),

    /// The metric's target resource could not be mapped to a kind
    #[error("unable to resolve object reference for {resource}: {message}")]
    ReferenceResolutionFailed { resource: String, message: String },

    /// Selector-based listing of target objects failed
    #[error("unable to list objects of {resource}: {message}")]
    EnumerationFailed { resource: String, message: String },

    /// The selector matched no objects to apportion the value across
    #[error("no objects matched the selector")]
    NoMatchingObjects,

    /// The metric is not part of the catalog
    #[error("the server could not find the metric {0}")]
    MetricNotFound(String),

    /// The query was cancelled before completion
    #[error("query cancelled before completion")]
    Cancelled,
}

impl ProviderError {
    /// Short machine-readable name, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::InventoryUnavailable(_) => "inventory_unavailable",
            ProviderError::ReferenceResolutionFailed { .. } => "reference_resolution_failed",
            ProviderError::EnumerationFailed { .. } => "enumeration_failed",
            ProviderError::NoMatchingObjects => "no_matching_objects",
            ProviderError::MetricNotFound(_) => "metric_not_found",
            ProviderError::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
