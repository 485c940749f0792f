use crate::MAX_ERROR_MESSAGE_LEN;

/// An error raised by one of the fallible module-preparation stages.
///
/// Runtime failures are not errors; they surface as
/// [`Trap`](crate::Trap) values inside
/// [`ExecutionResult`](crate::ExecutionResult).
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    /// The input is not well-formed WebAssembly: bad magic bytes, a truncated
    /// section, an invalid LEB128 encoding, or a name that is not UTF-8.
    #[error("malformed WebAssembly module: {0}")]
    Malformed(String),
    /// The module decoded but violates a validation rule, e.g. a type error
    /// in a function body or an out-of-range index.
    #[error("invalid WebAssembly module: {0}")]
    Validation(String),
    /// Imports could not be matched, a segment was out of bounds, the page
    /// ceiling was breached, or the start function trapped.
    #[error("instantiation failed: {0}")]
    Instantiation(String),
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(truncate(message.into()))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(truncate(message.into()))
    }

    pub(crate) fn instantiation(message: impl Into<String>) -> Self {
        Self::Instantiation(truncate(message.into()))
    }
}

// Embedders stash these messages in fixed-size carriers, so cap the length at
// the nearest character boundary below the limit.
fn truncate(mut message: String) -> String {
    if message.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_truncated() {
        let long = "x".repeat(2 * MAX_ERROR_MESSAGE_LEN);
        let Error::Malformed(message) = Error::malformed(long) else {
            panic!("wrong error variant");
        };
        assert_eq!(message.len(), MAX_ERROR_MESSAGE_LEN);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut long = "y".repeat(MAX_ERROR_MESSAGE_LEN - 1);
        long.push('\u{00e9}');
        long.push_str("tail");
        let Error::Validation(message) = Error::validation(long) else {
            panic!("wrong error variant");
        };
        assert!(message.len() < MAX_ERROR_MESSAGE_LEN);
        assert!(message.ends_with('y'));
    }
}
