use std::{fmt, path::PathBuf};

pub type GenResult<T> = Result<T, GenError>;

/// A declared `(category, name)` pair with no backing layer file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingAsset {
    pub category: String,
    pub name: String,
    pub path: PathBuf,
}

impl fmt::Display for MissingAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (expected '{}')",
            self.category,
            self.name,
            self.path.display()
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GenError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid distribution for category '{category}': {reason}")]
    InvalidDistribution { category: String, reason: String },

    #[error("{} layer asset(s) not found: {}", .missing.len(), join_missing(.missing))]
    AssetNotFound { missing: Vec<MissingAsset> },

    #[error(
        "capacity exceeded: requested {requested} unique combinations but only {available} are possible"
    )]
    CapacityExceeded { requested: u128, available: u128 },

    #[error("item {identifier}: no unique combination found after {attempts} attempts")]
    RetriesExhausted { identifier: u64, attempts: u64 },

    #[error("image decode error in category '{category}' at '{}': {reason}", .path.display())]
    ImageDecode {
        category: String,
        path: PathBuf,
        reason: String,
    },

    #[error("item {identifier}: {source}")]
    Item {
        identifier: u64,
        #[source]
        source: Box<GenError>,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn distribution(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            category: category.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(
        category: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::ImageDecode {
            category: category.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn item(identifier: u64, source: GenError) -> Self {
        Self::Item {
            identifier,
            source: Box::new(source),
        }
    }

    /// Category named by a decode failure, looking through item wrappers.
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::ImageDecode { category, .. } => Some(category.as_str()),
            Self::InvalidDistribution { category, .. } => Some(category.as_str()),
            Self::Item { source, .. } => source.category(),
            _ => None,
        }
    }

    /// Configuration-level errors abort a run before any output is written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_)
                | Self::InvalidDistribution { .. }
                | Self::AssetNotFound { .. }
                | Self::CapacityExceeded { .. }
                | Self::RetriesExhausted { .. }
                | Self::Validation(_)
        )
    }
}

fn join_missing(missing: &[MissingAsset]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
