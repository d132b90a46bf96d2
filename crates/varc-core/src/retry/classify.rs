//! Classify item errors into retry policy error kinds.

use super::error::ItemError;
use super::policy::ErrorKind;
use crate::backend::TransportError;

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify an item error into an ErrorKind for the retry policy.
pub fn classify(e: &ItemError) -> ErrorKind {
    match e {
        ItemError::Transport(TransportError::Curl(ce)) => classify_curl_error(ce),
        ItemError::Transport(TransportError::Http(code)) => classify_http_status(*code),
        ItemError::Transport(TransportError::Tool(_)) => ErrorKind::ToolUnavailable,
        ItemError::Transport(TransportError::Storage(_)) => ErrorKind::Storage,
        ItemError::Validation(_) => ErrorKind::Validation,
        ItemError::Storage(_) => ErrorKind::Storage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::RejectReason;

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), ErrorKind::Throttled);
        assert_eq!(classify_http_status(503), ErrorKind::Throttled);
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(matches!(classify_http_status(500), ErrorKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), ErrorKind::Http5xx(502)));
    }

    #[test]
    fn http_4xx_other() {
        assert_eq!(classify_http_status(404), ErrorKind::Other);
        assert_eq!(classify_http_status(403), ErrorKind::Other);
    }

    #[test]
    fn tool_failure_is_retryable_kind() {
        let e = ItemError::Transport(TransportError::Tool("exited with 1".into()));
        assert_eq!(classify(&e), ErrorKind::ToolUnavailable);
    }

    #[test]
    fn validation_reject_is_validation_kind() {
        let e = ItemError::Validation(RejectReason::BadMagic);
        assert_eq!(classify(&e), ErrorKind::Validation);
    }

    #[test]
    fn storage_errors_are_never_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e = ItemError::Storage(io);
        assert_eq!(classify(&e), ErrorKind::Storage);
    }
}
