//! Once-only diagnostics.
//!
//! Capture has to keep running when it meets an entry point or parameter it
//! doesn't fully understand, and such calls tend to repeat every frame. A
//! `Coverage` value remembers which messages it has already logged, so each
//! distinct gap is reported a single time per session.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Coverage {
    seen: HashSet<String>,
}

impl Coverage {
    pub fn new() -> Coverage {
        Coverage::default()
    }

    /// Log that `what` is not implemented, unless we've said so already.
    /// Return true if this was the first report.
    pub fn unimplemented(&mut self, what: &str) -> bool {
        if self.seen.contains(what) {
            return false;
        }
        log::warn!("gl-trace: not implemented: {}", what);
        self.seen.insert(what.to_string());
        true
    }

    /// Log `message` as a warning the first time it's seen.
    pub fn warn_once(&mut self, message: &str) -> bool {
        if self.seen.contains(message) {
            return false;
        }
        log::warn!("gl-trace: {}", message);
        self.seen.insert(message.to_string());
        true
    }

    pub fn reported(&self, what: &str) -> bool {
        self.seen.contains(what)
    }
}

#[test]
fn test_reports_once() {
    let mut coverage = Coverage::new();
    assert!(coverage.unimplemented("glBitmap"));
    assert!(!coverage.unimplemented("glBitmap"));
    assert!(coverage.unimplemented("glDrawPixels"));
    assert!(coverage.reported("glBitmap"));
    assert!(!coverage.reported("glFeedbackBuffer"));
}
