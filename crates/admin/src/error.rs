use thiserror::Error;

use shopcat_infra::command_dispatcher::DispatchError;
use shopcat_infra::projections::ProjectionError;

use crate::forms::FormErrors;

#[derive(Debug, Error)]
pub enum AdminError {
    /// The submission did not validate; nothing was dispatched.
    #[error("invalid form: {0}")]
    Form(FormErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Committed, but the read models could not follow; rebuild them.
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl From<FormErrors> for AdminError {
    fn from(value: FormErrors) -> Self {
        Self::Form(value)
    }
}
