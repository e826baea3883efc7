use std::io;

/// Errors from reading/writing the JSONL wire format itself (not request
/// handling errors, which are always carried in `Response::error`).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ProtocolError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ProtocolError::Io(_) => "io_error",
            ProtocolError::Malformed(_) => "protocol_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ProtocolError::Malformed("bad".into()).error_code(),
            "protocol_error"
        );
        let io_err: ProtocolError = io::Error::new(io::ErrorKind::NotFound, "x").into();
        assert_eq!(io_err.error_code(), "io_error");
    }
}
