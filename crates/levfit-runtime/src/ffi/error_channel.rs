//! Bounded error-message transport
//!
//! Loader and callback failures are reported to callers that may sit on
//! the far side of a language boundary, where unwinding is not an option.
//! `ErrorRecord` is the transport: a text message capped at a caller-chosen
//! byte capacity plus a "has error" flag. Writes truncate, never overrun,
//! and never fail.

/// Capacity used when the caller has no opinion, in bytes.
///
/// Platform loader diagnostics (path + strerror text) comfortably fit.
pub const DEFAULT_ERROR_CAPACITY: usize = 256;

/// A bounded-length diagnostic message plus an error flag.
///
/// The record starts in the no-error state. Every `set` marks it failed
/// and stores at most `capacity` bytes of the message, truncating on a
/// UTF-8 boundary; `clear` returns it to the no-error state. The capacity
/// is fixed at construction.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    capacity: usize,
    message: String,
    failed: bool,
}

impl ErrorRecord {
    /// Create a record that holds at most `capacity` bytes of message text.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            message: String::new(),
            failed: false,
        }
    }

    /// Record a failure, truncating the message to the record's capacity.
    pub fn set(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        let mut end = self.capacity.min(message.len());
        while end > 0 && !message.is_char_boundary(end) {
            end -= 1;
        }
        self.message.clear();
        self.message.push_str(&message[..end]);
        self.failed = true;
    }

    /// Reset to the no-error state.
    pub fn clear(&mut self) {
        self.message.clear();
        self.failed = false;
    }

    /// Whether a failure has been recorded since the last clear.
    pub fn has_error(&self) -> bool {
        self.failed
    }

    /// The recorded message; empty in the no-error state.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Maximum number of message bytes this record retains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ErrorRecord {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_CAPACITY)
    }
}
