//! Registry error types
//!
//! Error types for subscription registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A live subscription already uses this id
    IdInUse(String),
    /// The per-connection subscription limit is reached
    LimitReached { limit: usize },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::IdInUse(id) => write!(f, "Subscription id already active: {}", id),
            RegistryError::LimitReached { limit } => {
                write!(f, "Subscription limit reached: {}", limit)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
