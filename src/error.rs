use thiserror::Error;

/// Failures the engine itself produces. They never escape a promise method;
/// they are turned into the rejection reason of the promise they concern,
/// which is why reason types implement `From<Error>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A handler returned the very promise it was meant to settle.
    #[error("TypeError: a promise cannot be resolved with itself")]
    SelfResolution,
    /// A handler, or the `then` of an adopted value, panicked.
    #[error("handler panicked: {message}")]
    HandlerPanicked { message: String },
}

impl Error {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::HandlerPanicked { message }
    }
}
