use thiserror::Error;

/// Errors raised by the typed clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The MindMatrix server answered with a non-200 status, or was unreachable
    /// (`status` is `None`).
    #[error("{operation} failed: ({}) {message}", status_label(.status))]
    Api {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("{operation} failed: ({}) {message}", status_label(.status))]
    Reranker {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// A 200 response whose body did not have the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |s| s.to_string())
}

pub type Result<T> = std::result::Result<T, ClientError>;
