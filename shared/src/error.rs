use thiserror::Error;

/// Protocol-level failure taxonomy.
///
/// Transport failures tear the session down (the client retries a bounded
/// number of times, the hub just drops the peer). Framing and protocol
/// errors cost one message each and are never fatal. Capacity overflow is
/// fatal to the offending session only.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(#[from] serde_json::Error),

    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error("outbound queue full")]
    Capacity,
}
