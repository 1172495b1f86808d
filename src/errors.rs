use thiserror::Error;

/// Failures an exchange adapter can hit while connecting or streaming.
///
/// All variants are retriable from the supervisor's point of view: the
/// connection is torn down, the error logged, and the adapter restarted
/// after the reconnect delay.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("websocket transport error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection bootstrap failed: {0}")]
    Bootstrap(#[from] reqwest::Error),

    #[error("subscription rejected: {0}")]
    Subscribe(String),

    #[error("server closed the connection")]
    ConnectionClosed,

    #[error("message stream ended")]
    StreamEnded,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A single frame could not be turned into trade events.
///
/// Decode failures never tear down a connection: the frame is logged with a
/// truncated sample and the read loop continues.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame decompression failed: {0}")]
    Decompress(#[from] std::io::Error),

    #[error("unexpected frame shape: {0}")]
    Shape(String),

    #[error("bad numeric field {field}: {value}")]
    Number { field: &'static str, value: String },
}

impl DecodeError {
    pub fn shape(msg: impl Into<String>) -> Self {
        DecodeError::Shape(msg.into())
    }

    pub fn number(field: &'static str, value: impl Into<String>) -> Self {
        DecodeError::Number {
            field,
            value: value.into(),
        }
    }
}
