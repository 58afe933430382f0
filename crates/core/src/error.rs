use crate::state::JobState;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("illegal job state transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },
}
