use serde::{Deserialize, Serialize};

/// Numeric result codes shared by every public operation.
pub mod retcode {
    pub const OK: i32 = 0;
    /// The server accepted the operation but will complete it asynchronously.
    pub const ASYNC: i32 = 1;
    pub const ERROR: i32 = 100;
    pub const FAILED: i32 = 102;
    pub const TIMEOUT: i32 = 103;
    pub const OFFLINE: i32 = 104;
}

/// Structured error attached to a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetError {
    pub code: i32,
    pub message: String,
}

/// Uniform result envelope for every facade operation.
///
/// `retcode` 0 carries a payload in `data`; every non-zero code leaves
/// `data` empty and may attach a structured error.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult<T> {
    pub retcode: i32,
    pub status: String,
    pub data: Option<T>,
    pub error: Option<RetError>,
}

impl<T> CallResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            retcode: retcode::OK,
            status: "ok".into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn accepted() -> Self {
        Self {
            retcode: retcode::ASYNC,
            status: "async".into(),
            data: None,
            error: None,
        }
    }

    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            retcode: retcode::FAILED,
            status: "failed".into(),
            data: None,
            error: Some(RetError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            retcode: retcode::ERROR,
            status: "error".into(),
            data: None,
            error: Some(RetError {
                code: retcode::ERROR,
                message: message.into(),
            }),
        }
    }

    pub fn timeout() -> Self {
        Self {
            retcode: retcode::TIMEOUT,
            status: "timeout".into(),
            data: None,
            error: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            retcode: retcode::OFFLINE,
            status: "offline".into(),
            data: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.retcode == retcode::OK
    }

    /// Re-wrap the payload, keeping code/status/error intact.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        CallResult {
            retcode: self.retcode,
            status: self.status,
            data: self.data.map(f),
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_data() {
        let r = CallResult::ok(7u64);
        assert!(r.is_ok());
        assert_eq!(r.data, Some(7));
        assert_eq!(r.status, "ok");
    }

    #[test]
    fn failed_envelope_has_structured_error() {
        let r: CallResult<()> = CallResult::failed(12, "no permission");
        assert_eq!(r.retcode, retcode::FAILED);
        assert_eq!(
            r.error,
            Some(RetError {
                code: 12,
                message: "no permission".into()
            })
        );
        assert!(r.data.is_none());
    }

    #[test]
    fn map_preserves_code() {
        let r: CallResult<u32> = CallResult::timeout();
        let mapped = r.map(|v| v.to_string());
        assert_eq!(mapped.retcode, retcode::TIMEOUT);
        assert!(mapped.data.is_none());
    }
}
