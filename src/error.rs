use thiserror::Error;

/// Main error type for Karp operations
#[derive(Error, Debug)]
pub enum KarpError {
    #[error("Parse error at position {position} near '{fragment}': {message}")]
    Parse {
        position: usize,
        fragment: String,
        message: String,
    },

    #[error("Incomplete query '{query}': {message}")]
    IncompleteQuery { query: String, message: String },

    #[error("Can't sort by field '{field}' in resource '{resource_id}'")]
    UnsupportedField { resource_id: String, field: String },

    #[error("Invalid sort order '{0}', expected 'asc' or 'desc'")]
    InvalidSortOrder(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin '{plugin_id}' failed: {message}")]
    Plugin { plugin_id: String, message: String },

    #[error("Resource not found: {resource_id} (version {version:?})")]
    ResourceNotFound {
        resource_id: String,
        version: Option<u32>,
    },

    #[error("Field '{field}' is not referenceable in resource '{resource_id}'")]
    NotReferenceable { resource_id: String, field: String },

    #[error("Invalid resource config: {0}")]
    InvalidConfig(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Karp operations
pub type Result<T> = std::result::Result<T, KarpError>;

impl KarpError {
    /// Build a parse error pointing at `fragment`, which starts at `position`
    pub fn parse(position: usize, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        KarpError::Parse {
            position,
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// Errors raised before a query ever reaches the search backend
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            KarpError::Parse { .. }
                | KarpError::IncompleteQuery { .. }
                | KarpError::UnsupportedField { .. }
                | KarpError::InvalidSortOrder(_)
        )
    }

    /// Errors caused by a misconfigured resource rather than by missing data
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            KarpError::NotImplemented(_)
                | KarpError::PluginNotFound(_)
                | KarpError::NotReferenceable { .. }
                | KarpError::InvalidConfig(_)
        )
    }
}
