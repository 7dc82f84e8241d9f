use thiserror::Error;

/// Failures from turning a decided log entry into a state transition.
/// Every variant is recoverable: the caller logs and moves on, the
/// game state is left unchanged.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("malformed command: {0}")]
    Parse(String),

    #[error("precondition violated: {0}")]
    Precondition(String),
}
