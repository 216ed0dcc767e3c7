mod cancel;
mod error;

pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelListener};
    pub use crate::error::OrchestratorError;
}
