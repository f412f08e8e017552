use thiserror::Error;

/// Why a single invocation could not be decoded.
///
/// None of these abort a batch; the dispatcher logs them and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("redraw payload is not an array of updates")]
    MalformedBatch,
    #[error("unknown redraw event `{0}`")]
    UnknownEvent(String),
    #[error("`{event}` arguments are not an array")]
    NotAnArray { event: &'static str },
    #[error("`{event}` expects at least {expected} arguments, got {got}")]
    Arity {
        event: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("`{event}` argument {index} is not {expected}")]
    Type {
        event: &'static str,
        index: usize,
        expected: &'static str,
    },
}
