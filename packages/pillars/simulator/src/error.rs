use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("step {step} references step {referenced}, which has not executed yet")]
    ForwardReference { step: usize, referenced: usize },

    #[error(transparent)]
    Core(#[from] paladin_core::error::CoreError),
}
