//! Constructors for promises that are settled up front, and the
//! `{promise, resolve, reject}` triple conformance harnesses drive.
//!
use crate::{
    config::Config,
    payload::{Callback, Payload, Reason},
    promise::Promise,
};
use std::{fmt, sync::Arc};

/// A promise together with its own `fulfill` and `reject`, detached so they
/// can be handed to whoever will produce the outcome.
///
/// # Examples
///
/// ```
/// use thenable::{deferred, Config, Error, TaskQueue};
/// let queue = TaskQueue::new();
/// let d = deferred::<i32, Error>(&Config::new(queue.clone()));
/// let doubled = d.promise.and_then(|v| Ok(v * 2));
/// (d.resolve)(42);
/// (d.resolve)(7);
/// queue.run_until_idle();
/// assert_eq!(doubled.outcome(), Some(Ok(84)));
/// ```
pub struct Deferred<T, E> {
    pub promise: Promise<T, E>,
    pub resolve: Callback<T>,
    pub reject: Callback<E>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            resolve: self.resolve.clone(),
            reject: self.reject.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("promise", &self.promise)
            .finish_non_exhaustive()
    }
}

/// An undecided promise with its settle functions.
pub fn deferred<T: Payload<E>, E: Reason>(config: &Config) -> Deferred<T, E> {
    let promise = Promise::new(config.clone());
    let (fulfill, reject) = (promise.clone(), promise.clone());
    Deferred {
        promise,
        resolve: Arc::new(move |value: T| fulfill.fulfill(value)),
        reject: Arc::new(move |reason: E| reject.reject(reason)),
    }
}

/// A promise already asked to fulfill with `value`.
pub fn resolved<T: Payload<E>, E: Reason>(config: &Config, value: T) -> Promise<T, E> {
    let promise = Promise::new(config.clone());
    promise.fulfill(value);
    promise
}

/// A promise already rejected with `reason`.
pub fn rejected<T: Payload<E>, E: Reason>(config: &Config, reason: E) -> Promise<T, E> {
    let promise = Promise::new(config.clone());
    promise.reject(reason);
    promise
}

#[cfg(test)]
mod tests {
use super::{deferred, rejected, resolved};
use crate::{Config, Error, PromiseState, TaskQueue};

#[test]
fn test_resolved_and_rejected_are_settled() {
    let config = Config::new(TaskQueue::new());
    let ok = resolved::<_, Error>(&config, "hi");
    assert_eq!(ok.outcome(), Some(Ok("hi")));
    let err = rejected::<&str, Error>(&config, Error::SelfResolution);
    assert_eq!(err.state(), PromiseState::Rejected);
}

#[test]
fn test_deferred_reject_then_resolve_keeps_reject() {
    let config = Config::new(TaskQueue::new());
    let d = deferred::<u8, Error>(&config);
    (d.reject)(Error::SelfResolution);
    (d.resolve)(1);
    assert_eq!(d.promise.outcome(), Some(Err(Error::SelfResolution)));
}
}
