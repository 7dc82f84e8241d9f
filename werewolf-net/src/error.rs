use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to send datagram: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode envelope: {0}")]
    Decode(#[source] bincode::Error),
}
