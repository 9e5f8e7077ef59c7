use storage::StorageError;
use thiserror::Error;

use crate::binder::ControlId;

/// Raised while wiring a session; the UI is missing something it must provide.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("required control `{0}` is missing from the layout")]
    ElementMissing(ControlId),
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
