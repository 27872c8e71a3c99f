use crate::{
    payload::{Payload, Reason},
    promise::Promise,
};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

/// Waits for a promise to settle. Any number of these may wait on the same
/// promise; all of them are woken by the transition.
///
/// Awaiting does not chain: no handler runs and no derived promise is made.
///
/// # Examples
///
/// ```
/// use thenable::{Config, Error, Promise, ThreadScheduler};
/// use futures::executor::block_on;
/// use std::thread;
/// let p: Promise<String, Error> = Promise::new(Config::new(ThreadScheduler::new()));
/// let waiting = p.settled();
/// let task1 = thread::spawn(move || block_on(waiting));
/// p.fulfill(String::from("🍓"));
/// assert_eq!(task1.join().expect("The task1 thread has panicked"), Ok(String::from("🍓")));
/// ```
pub struct Settled<T, E> {
    promise: Promise<T, E>,
}

impl<T, E> Settled<T, E> {
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self { promise }
    }
}

impl<T, E> Clone for Settled<T, E> {
    fn clone(&self) -> Self {
        Self::new(self.promise.clone())
    }
}

impl<T, E> fmt::Debug for Settled<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Settled").field(&self.promise).finish()
    }
}

impl<T: Payload<E>, E: Reason> Future for Settled<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.promise.poll_outcome(cx.waker()) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}
