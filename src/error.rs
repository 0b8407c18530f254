use thiserror::Error;

/// Errors raised while talking GMP to the management daemon.
#[derive(Error, Debug)]
pub enum GmpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{command} failed with status {status}: {text}")]
    Response {
        command: String,
        status: String,
        text: String,
    },

    #[error("connection closed by daemon before the response was complete")]
    ConnectionClosed,

    #[error("no {kind} found matching {name:?}")]
    NotFound { kind: &'static str, name: String },
}

impl From<quick_xml::events::attributes::AttrError> for GmpError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        GmpError::Xml(e.into())
    }
}
