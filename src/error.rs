use thiserror::Error;

/// Errors surfaced by the public API.
///
/// `InvariantViolation`s (contacts with two static endpoints, duplicate tree
/// inserts, and the like) are bugs rather than recoverable conditions and are
/// reported via `debug_assert!`/`panic!` at the point of detection instead of
/// this enum -- see the module-level docs on `solver` and `tree`.
#[derive(Debug, Error)]
pub enum PhysicsError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },
}

impl PhysicsError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        PhysicsError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        PhysicsError::NotFound {
            message: message.into(),
        }
    }
}

pub type Result<T> = core::result::Result<T, PhysicsError>;
