//! Deferred task execution. Promises never run continuations on the call
//! stack that made them eligible; they hand them to a [`Scheduler`] instead.
//!
use std::{
    collections::VecDeque,
    fmt, io,
    sync::{
        mpsc::{channel, Sender},
        Arc, Mutex, PoisonError,
    },
    thread,
};
use tracing::{trace, warn};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks later, after the current synchronous execution completes.
/// Tasks scheduled back-to-back must run in the order they were scheduled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, task: Task) {
        (**self).schedule(task)
    }
}

/// A FIFO queue drained by whoever owns the event loop.
///
/// Clones share the same queue, so one clone can be handed to a
/// [`Config`](crate::Config) while another drives it.
///
/// # Examples
///
/// ```
/// use thenable::{Scheduler, TaskQueue};
/// use std::sync::{Arc, Mutex};
/// let queue = TaskQueue::new();
/// let seen = Arc::new(Mutex::new(vec![]));
/// for i in 0..3 {
///     let seen = seen.clone();
///     queue.schedule(Box::new(move || seen.lock().unwrap().push(i)));
/// }
/// assert!(seen.lock().unwrap().is_empty());
/// assert_eq!(queue.run_until_idle(), 3);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
/// ```
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the oldest queued task. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        // The lock is released before the task runs so it can schedule more.
        let task = self.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including the ones scheduled by
    /// the tasks being run. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        trace!(ran, "task queue idle");
        ran
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) {
        self.lock().push_back(task);
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

/// Runs tasks on one dedicated worker thread, in the order they arrive
/// through a multi-producer channel.
///
/// The worker exits once every clone of the scheduler has been dropped and
/// the queued tasks have run.
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    sender: Sender<Task>,
}

impl ThreadScheduler {
    /// Spawn the worker.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create the thread, as `std::thread::spawn`
    /// does. Use [`try_named`](Self::try_named) to handle that instead.
    pub fn new() -> Self {
        match Self::try_named("thenable-scheduler") {
            Ok(scheduler) => scheduler,
            Err(err) => panic!("failed to spawn scheduler thread: {err}"),
        }
    }

    /// Spawn the worker with the given thread name.
    pub fn try_named(name: &str) -> io::Result<Self> {
        let (tx, rx) = channel::<Task>();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            for task in rx {
                task();
            }
        })?;
        trace!(name, "scheduler thread started");
        Ok(Self { sender: tx })
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("scheduler thread is gone; task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
use super::{Scheduler, TaskQueue, ThreadScheduler};
use std::sync::{mpsc::channel, Arc, Mutex};

#[test]
fn test_task_queue_runs_nested_tasks_after_queued_ones() {
    let queue = TaskQueue::new();
    let order = Arc::new(Mutex::new(vec![]));
    let (q, o) = (queue.clone(), order.clone());
    queue.schedule(Box::new(move || {
        o.lock().unwrap().push("first");
        let o2 = o.clone();
        q.schedule(Box::new(move || o2.lock().unwrap().push("nested")));
    }));
    let o = order.clone();
    queue.schedule(Box::new(move || o.lock().unwrap().push("second")));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.run_until_idle(), 3);
    assert!(queue.is_empty());
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "nested"]);
}

#[test]
fn test_task_queue_run_next_on_empty() {
    let queue = TaskQueue::new();
    assert!(!queue.run_next());
    assert_eq!(queue.run_until_idle(), 0);
}

#[test]
fn test_thread_scheduler_keeps_fifo_order() {
    let scheduler = ThreadScheduler::new();
    let (tx, rx) = channel();
    for i in 0..10 {
        let tx = tx.clone();
        scheduler.schedule(Box::new(move || tx.send(i).unwrap()));
    }
    let got: Vec<i32> = rx.iter().take(10).collect();
    assert_eq!(got, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_named_thread_scheduler_runs_tasks() {
    let scheduler = ThreadScheduler::try_named("named-worker").expect("spawn worker");
    let (tx, rx) = channel();
    scheduler.schedule(Box::new(move || {
        tx.send(std::thread::current().name().map(String::from)).unwrap()
    }));
    assert_eq!(rx.recv().unwrap(), Some("named-worker".to_string()));
}

#[test]
fn test_shared_scheduler_through_arc() {
    let queue = TaskQueue::new();
    let shared: Arc<dyn Scheduler> = Arc::new(queue.clone());
    let hits = Arc::new(Mutex::new(0));
    let h = hits.clone();
    shared.schedule(Box::new(move || *h.lock().unwrap() += 1));
    queue.run_until_idle();
    assert_eq!(*hits.lock().unwrap(), 1);
}
}
