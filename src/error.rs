use crate::relationships::Relationship;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of the relationship workflow and the chat gateway.
///
/// Handlers never build responses from these directly; they bubble up through
/// [`crate::AppError`], which maps each kind to a status code and a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Carries the relationship that already occupies the pair.
    #[error("a relationship already exists between these users")]
    Duplicate(Box<Relationship>),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Invalid(&'static str),

    #[error("sign in required")]
    Unauthenticated,

    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        use CoreError::*;
        match self {
            NotFound(_) => "not_found",
            Duplicate(_) => "duplicate",
            Forbidden(_) => "forbidden",
            InvalidState(_) => "invalid_state",
            InvalidTransition(_) => "invalid_transition",
            Invalid(_) => "invalid",
            Unauthenticated => "unauthenticated",
            Unavailable(_) => "unavailable",
        }
    }
}
