use thiserror::Error;

use crate::models::Category;

/// Rejected configurator operation. The order is left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid product category: {0}")]
    InvalidCategory(String),

    #[error("Unknown package '{package}' for {category}")]
    UnknownPackage { category: Category, package: String },

    #[error("Unknown option group '{0}'")]
    UnknownGroup(String),

    #[error("Unknown choice '{choice}' for option group '{group}'")]
    UnknownChoice { group: String, choice: String },

    #[error("Unknown extra '{0}'")]
    UnknownExtra(String),

    #[error("{bolt_on} cannot be added to a {root} order")]
    BoltOnNotAllowed { root: Category, bolt_on: Category },

    #[error("{0} have already been added to this order")]
    BoltOnAlreadyExists(Category),

    #[error("No additional {0} on this order")]
    BoltOnMissing(Category),

    #[error("Quantity cannot be set on a {0} order")]
    QuantityNotApplicable(Category),
}

/// Problems found while loading price tables.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read price tables: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse price tables: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid price table for {scope}: {reason}")]
    Invalid { scope: String, reason: String },
}

impl TableError {
    pub(crate) fn invalid(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        TableError::Invalid {
            scope: scope.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a submission gateway.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Form endpoint rejected the order ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("No form endpoint configured for {0}")]
    NoEndpoint(Category),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
