//! Structural view of the values a promise settles with.
//!
//! A value is *thenable* when it exposes a `then` at all. Whether that `then`
//! can actually be called is only found out when the promise reads it, so a
//! value may classify as thenable and still end up stored as it is.
//!
use crate::{error::Error, promise::PromiseId};
use std::{fmt, sync::Arc};

/// One side of a settlement handed to foreign code, e.g. a promise's own
/// `fulfill` or `reject` bound to it.
pub type Callback<V> = Arc<dyn Fn(V) + Send + Sync + 'static>;

/// A callable `then`: receives the adopting promise's `fulfill` and `reject`.
/// Returning `Err` reports a synchronous failure of the call itself.
pub type ThenFn<T, E> =
    Arc<dyn Fn(Callback<T>, Callback<E>) -> Result<(), E> + Send + Sync + 'static>;

/// What reading the `then` of a thenable value produced.
pub enum Then<T, E> {
    Callable(ThenFn<T, E>),
    /// The value has a `then`, but it is not something that can be called.
    NotCallable,
}

impl<T, E> fmt::Debug for Then<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Then::Callable(_) => f.write_str("Then::Callable"),
            Then::NotCallable => f.write_str("Then::NotCallable"),
        }
    }
}

/// A value a promise can be fulfilled with.
///
/// The defaults describe a plain value: no `then`, not a promise. Types that
/// can carry other promises or foreign promise-like objects override them.
///
/// # Examples
///
/// ```
/// use thenable::{Error, Payload, Promise, PromiseId, Then};
///
/// #[derive(Clone)]
/// enum Job {
///     Done(u32),
///     Waiting(Promise<Job, Error>),
/// }
///
/// impl Payload<Error> for Job {
///     fn has_then(&self) -> bool {
///         matches!(self, Job::Waiting(_))
///     }
///     fn read_then(&self) -> Result<Then<Job, Error>, Error> {
///         match self {
///             Job::Waiting(p) => Ok(Then::Callable(p.then_fn())),
///             Job::Done(_) => Ok(Then::NotCallable),
///         }
///     }
///     fn promise_id(&self) -> Option<PromiseId> {
///         match self {
///             Job::Waiting(p) => Some(p.id()),
///             Job::Done(_) => None,
///         }
///     }
/// }
/// ```
pub trait Payload<E>: Clone + Send + 'static {
    /// Whether the value exposes a `then` at all. Presence only; nothing is
    /// read or called.
    fn has_then(&self) -> bool {
        false
    }

    /// Read the `then`. Only consulted when [`has_then`](Self::has_then) is
    /// true. An `Err` stands for the read itself failing.
    fn read_then(&self) -> Result<Then<Self, E>, E> {
        Ok(Then::NotCallable)
    }

    /// Identity of the promise this value is, if it is one.
    fn promise_id(&self) -> Option<PromiseId> {
        None
    }
}

/// Whether `value` exposes a `then`, without reading it.
pub fn is_thenable<E, V: Payload<E>>(value: &V) -> bool {
    value.has_then()
}

/// A rejection reason. The engine builds its own reasons from [`Error`].
pub trait Reason: Clone + Send + From<Error> + 'static {}

impl<E: Clone + Send + From<Error> + 'static> Reason for E {}

macro_rules! plain_payload {
    ($($t:ty),* $(,)?) => {
        $(impl<E> Payload<E> for $t {})*
    };
}

plain_payload!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, Box<str>, Arc<str>,
);

impl<E, T: Payload<E>> Payload<E> for Option<T> {}

impl<E, T: Payload<E>> Payload<E> for Vec<T> {}
