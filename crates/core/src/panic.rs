//! Panic capture at thread and callback boundaries
//!
//! Both task threads and dispatcher drains run user code under
//! `catch_unwind`. This module turns the opaque panic payload into a message
//! that can be logged and handed back to whoever is waiting.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `f`, converting a panic into its message
pub(crate) fn capture<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| message(payload.as_ref()))
}

/// Extract a human readable message from a panic payload
pub(crate) fn message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_success() {
        assert_eq!(capture(|| 42), Ok(42));
    }

    #[test]
    fn test_capture_str_payload() {
        let result = capture(|| -> () { panic!("boom") });
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn test_capture_formatted_payload() {
        let id = 7;
        let result = capture(|| -> () { panic!("task {} failed", id) });
        assert_eq!(result, Err("task 7 failed".to_string()));
    }

    #[test]
    fn test_unknown_payload() {
        let result = capture(|| std::panic::panic_any(13_u8));
        assert_eq!(result, Err("Unknown panic".to_string()));
    }
}
