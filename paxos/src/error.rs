use thiserror::Error;

/// Failures that can occur while turning bytes on the wire into
/// [`crate::Frame`]s and back.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[source] bincode::Error),
}
