use crate::{
    config::Config,
    error::Error,
    payload::{Callback, Payload, Reason, Then, ThenFn},
    settled::Settled,
};
use std::{
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::Waker,
};
use tracing::{debug, trace};

/// Process-unique identity of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PromiseId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a promise is in its lifecycle. `Fulfilled` and `Rejected` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
    Undecided,
    Fulfilled,
    Rejected,
}

impl PromiseState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PromiseState::Undecided)
    }
}

impl fmt::Display for PromiseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PromiseState::Undecided => "undecided",
            PromiseState::Fulfilled => "fulfilled",
            PromiseState::Rejected => "rejected",
        })
    }
}

#[derive(Debug)]
enum Slot<T, E> {
    Undecided,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Slot<T, E> {
    fn state(&self) -> PromiseState {
        match self {
            Slot::Undecided => PromiseState::Undecided,
            Slot::Fulfilled(_) => PromiseState::Fulfilled,
            Slot::Rejected(_) => PromiseState::Rejected,
        }
    }
}

type Continuation<T, E> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

struct Inner<T, E> {
    slot: Slot<T, E>,
    continuations: Vec<Continuation<T, E>>,
    wakers: Vec<Waker>,
}

struct Shared<T, E> {
    id: PromiseId,
    config: Config,
    inner: Mutex<Inner<T, E>>,
}

/// What a continuation decided for its derived promise.
enum Step<U, E> {
    /// No handler for this outcome: settle the same way, right away.
    Pass(Result<U, E>),
    /// A handler ran; its result settles the derived promise later.
    Returned(Result<U, E>),
}

/// A value that becomes known exactly once, either as a fulfillment value
/// `T` or as a rejection reason `E`.
///
/// `Promise` is a handle: clones refer to the same promise. Handlers chained
/// with [`then`](Self::then) and friends are always run through the
/// configured scheduler, never on the stack of the call that made them
/// eligible, and each runs at most once.
///
/// # Examples
///
/// ```
/// use thenable::{Config, Error, Promise, TaskQueue};
/// let queue = TaskQueue::new();
/// let p: Promise<i32, Error> = Promise::new(Config::new(queue.clone()));
/// let doubled = p.and_then(|v| Ok(v * 2));
/// p.fulfill(21);
/// assert!(doubled.outcome().is_none());
/// queue.run_until_idle();
/// assert_eq!(doubled.outcome(), Some(Ok(42)));
/// ```
pub struct Promise<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Payload<E>, E: Reason> Promise<T, E> {
    /// Create an undecided promise.
    pub fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: PromiseId::next(),
                config,
                inner: Mutex::new(Inner {
                    slot: Slot::Undecided,
                    continuations: vec![],
                    wakers: vec![],
                }),
            }),
        }
    }

    /// Whether `value` exposes a `then`. Presence only: a thenable whose
    /// `then` cannot be called is still classified as thenable.
    pub fn is_thenable(value: &T) -> bool {
        value.has_then()
    }

    pub fn id(&self) -> PromiseId {
        self.shared.id
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn state(&self) -> PromiseState {
        self.lock().slot.state()
    }

    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    /// The settled value or reason, once there is one.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &self.lock().slot {
            Slot::Undecided => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Ask the promise to fulfill with `value`. Ignored once settled.
    ///
    /// With extensions enabled, a thenable `value` is adopted: the promise
    /// settles the way the thenable eventually does.
    pub fn fulfill(&self, value: T) {
        if self.ignored("fulfill") {
            return;
        }
        if self.shared.config.extensions_enabled() {
            match guarded(|| -> Result<_, E> { Ok((value.has_then(), value.promise_id())) }) {
                Err(reason) => {
                    debug!(promise = %self.id(), "classifying value failed");
                    self.defer(move |p| p.reject(reason));
                    return;
                }
                Ok((_, Some(id))) if id == self.id() => {
                    debug!(promise = %self.id(), "promise asked to adopt itself");
                    self.defer(|p| p.reject(E::from(Error::SelfResolution)));
                    return;
                }
                Ok((true, _)) => {
                    self.assimilate(value);
                    return;
                }
                Ok((false, _)) => {}
            }
        }
        self.transition(Slot::Fulfilled(value));
    }

    /// Ask the promise to reject with `reason`. Ignored once settled. The
    /// reason is used as it is.
    pub fn reject(&self, reason: E) {
        if self.ignored("reject") {
            return;
        }
        self.transition(Slot::Rejected(reason));
    }

    /// Chain both outcomes. The returned promise settles with whatever the
    /// handler that runs produces: `Ok` fulfills it, `Err` rejects it.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Payload<E>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
        R: FnOnce(E) -> Result<U, E> + Send + 'static,
    {
        self.subscribe(move |outcome| {
            Step::Returned(match outcome {
                Ok(value) => guarded(move || on_fulfilled(value)),
                Err(reason) => guarded(move || on_rejected(reason)),
            })
        })
    }

    /// Chain the fulfillment only. A rejection passes through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Payload<E>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.subscribe(move |outcome| match outcome {
            Ok(value) => Step::Returned(guarded(move || on_fulfilled(value))),
            Err(reason) => Step::Pass(Err(reason)),
        })
    }

    /// Chain the rejection only. A fulfillment passes through unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use thenable::{Config, Error, Promise, TaskQueue};
    /// let queue = TaskQueue::new();
    /// let p: Promise<String, Error> = Promise::new(Config::new(queue.clone()));
    /// let recovered = p.catch(|err| Ok(format!("recovered from {err}")));
    /// p.reject(Error::SelfResolution);
    /// queue.run_until_idle();
    /// assert!(recovered.outcome().unwrap().unwrap().starts_with("recovered"));
    /// ```
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.subscribe(move |outcome| match outcome {
            Ok(value) => Step::Pass(Ok(value)),
            Err(reason) => Step::Returned(guarded(move || on_rejected(reason))),
        })
    }

    /// Chain without handlers: the returned promise settles exactly as this
    /// one does.
    pub fn chain(&self) -> Promise<T, E> {
        self.subscribe(Step::Pass)
    }

    /// This promise as a callable `then`, for value types that embed
    /// promises so they can be adopted. See [`Payload`].
    pub fn then_fn(&self) -> ThenFn<T, E> {
        let source = self.clone();
        Arc::new(
            move |on_fulfilled: Callback<T>, on_rejected: Callback<E>| -> Result<(), E> {
                source.then(
                    move |value| {
                        on_fulfilled(value);
                        Ok(())
                    },
                    move |reason| {
                        on_rejected(reason);
                        Ok(())
                    },
                );
                Ok(())
            },
        )
    }

    /// A future that resolves to the outcome once the promise settles.
    pub fn settled(&self) -> Settled<T, E> {
        Settled::new(self.clone())
    }

    /// The outcome if settled; otherwise remember `waker` for the transition.
    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Option<Result<T, E>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &inner.slot {
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
            Slot::Undecided => {
                if !inner.wakers.iter().any(|w| w.will_wake(waker)) {
                    inner.wakers.push(waker.clone());
                }
                None
            }
        }
    }

    fn ignored(&self, request: &'static str) -> bool {
        let state = self.state();
        if state.is_settled() {
            debug!(promise = %self.id(), %state, request, "settle request ignored");
        }
        state.is_settled()
    }

    /// Adopt the eventual outcome of a thenable `value`.
    fn assimilate(&self, value: T) {
        trace!(promise = %self.id(), "adopting thenable");
        match guarded(|| value.read_then()) {
            Ok(Then::Callable(then)) => {
                let (on_fulfilled, on_rejected) = self.callbacks();
                if let Err(reason) = guarded(move || then(on_fulfilled, on_rejected)) {
                    debug!(promise = %self.id(), "thenable failed while being adopted");
                    self.defer(move |p| p.reject(reason));
                }
            }
            Ok(Then::NotCallable) => self.defer(move |p| p.transition(Slot::Fulfilled(value))),
            Err(reason) => {
                debug!(promise = %self.id(), "reading then failed");
                self.defer(move |p| p.reject(reason));
            }
        }
    }

    fn callbacks(&self) -> (Callback<T>, Callback<E>) {
        let (fulfill, reject) = (self.clone(), self.clone());
        (
            Arc::new(move |value| fulfill.fulfill(value)),
            Arc::new(move |reason| reject.reject(reason)),
        )
    }

    /// The single guarded move out of `Undecided`.
    fn transition(&self, slot: Slot<T, E>) {
        let (state, wakers) = {
            let mut inner = self.lock();
            if inner.slot.state().is_settled() {
                debug!(promise = %self.id(), state = %inner.slot.state(), "transition ignored");
                return;
            }
            inner.slot = slot;
            (inner.slot.state(), mem::take(&mut inner.wakers))
        };
        trace!(promise = %self.id(), %state, "promise settled");
        for waker in wakers {
            waker.wake()
        }
        self.publish();
    }

    /// Hand the outcome to whatever continuations are registered now.
    fn publish(&self) {
        if self.shared.config.extensions_enabled() {
            self.defer(|p| p.drain());
        } else {
            self.drain();
        }
    }

    fn drain(&self) {
        let (outcome, batch) = {
            let mut inner = self.lock();
            let outcome = match &inner.slot {
                Slot::Undecided => return,
                Slot::Fulfilled(value) => Ok(value.clone()),
                Slot::Rejected(reason) => Err(reason.clone()),
            };
            (outcome, mem::take(&mut inner.continuations))
        };
        if batch.is_empty() {
            return;
        }
        trace!(promise = %self.id(), count = batch.len(), "delivering outcome");
        for continuation in batch {
            continuation(outcome.clone());
        }
    }

    fn subscribe<U, S>(&self, step: S) -> Promise<U, E>
    where
        U: Payload<E>,
        S: FnOnce(Result<T, E>) -> Step<U, E> + Send + 'static,
    {
        let derived = Promise::new(self.shared.config.clone());
        let target = derived.clone();
        let continuation: Continuation<T, E> = Box::new(move |outcome| match step(outcome) {
            Step::Pass(Ok(value)) => target.fulfill(value),
            Step::Pass(Err(reason)) => target.reject(reason),
            Step::Returned(result) => target.settle_returned(result),
        });
        let settled = {
            let mut inner = self.lock();
            inner.continuations.push(continuation);
            inner.slot.state().is_settled()
        };
        trace!(promise = %self.id(), derived = %derived.id(), "continuation registered");
        if settled {
            self.publish();
        }
        derived
    }

    /// Settle with what a handler produced. Always deferred.
    fn settle_returned(&self, result: Result<T, E>) {
        let result = result.and_then(|value| {
            match guarded(|| -> Result<_, E> { Ok(value.promise_id()) })? {
                Some(id) if id == self.id() => {
                    debug!(promise = %self.id(), "handler returned the promise it settles");
                    Err(E::from(Error::SelfResolution))
                }
                _ => Ok(value),
            }
        });
        match result {
            Ok(value) => self.defer(move |p| p.fulfill(value)),
            Err(reason) => {
                debug!(promise = %self.id(), "handler failed");
                self.defer(move |p| p.reject(reason));
            }
        }
    }

    fn defer<F>(&self, task: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        let promise = self.clone();
        self.shared
            .config
            .scheduler()
            .schedule(Box::new(move || task(&promise)));
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run foreign code, turning a panic into a rejection reason.
fn guarded<R, E: From<Error>>(f: impl FnOnce() -> Result<R, E>) -> Result<R, E> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(E::from(Error::from_panic(payload))))
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .shared
            .inner
            .lock()
            .map(|inner| inner.slot.state())
            .unwrap_or_else(|poisoned| poisoned.into_inner().slot.state());
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("state", &state)
            .finish()
    }
}
