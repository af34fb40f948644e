//! An in-order command queue driven by a dedicated device thread.
//!
//! Submissions never block the submitting thread; commands execute one at a
//! time in submission order and [`CommandQueue::finish`] is the explicit
//! synchronization point. Work that borrows from the caller goes through
//! [`CommandQueue::scope`], which drains the queue before the borrow can end.
//!
//! A panic raised by a command is reported only to whoever submitted it:
//! scoped commands to their own `scope` call, free-standing commands to
//! [`CommandQueue::finish`].

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;
type PanicPayload = Box<dyn Any + Send + 'static>;
type FailureSlot = Arc<Mutex<Option<PanicPayload>>>;

enum Command {
    Run { job: Job, failure: FailureSlot },
    Fence(Sender<()>),
    Shutdown,
}

pub struct CommandQueue {
    name: String,
    sender: Sender<Command>,
    failure: FailureSlot,
    submitted: AtomicU64,
    device: Mutex<Option<JoinHandle<()>>>,
}

impl CommandQueue {
    /// Create a queue and start its device thread.
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Command>();
        let device_name = name.clone();

        let device = thread::Builder::new().name(name.clone()).spawn(move || {
            for command in receiver {
                match command {
                    Command::Run { job, failure } => {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                            log::debug!("command on {} panicked", device_name);
                            let mut slot = failure.lock();
                            if slot.is_none() {
                                *slot = Some(payload);
                            }
                        }
                    }
                    Command::Fence(done) => {
                        let _ = done.send(());
                    }
                    Command::Shutdown => break,
                }
            }
        })?;

        log::info!("command queue {} started", name);
        Ok(CommandQueue {
            name,
            sender,
            failure: FailureSlot::default(),
            submitted: AtomicU64::new(0),
            device: Mutex::new(Some(device)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of commands submitted since creation.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Submit a self-contained command.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(job), &self.failure);
    }

    fn submit(&self, job: Job, failure: &FailureSlot) {
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed);
        log::trace!("{}: enqueue command #{}", self.name, seq);
        let command = Command::Run {
            job,
            failure: Arc::clone(failure),
        };
        self.sender
            .send(command)
            .expect("command queue device thread has stopped");
    }

    /// Block until every command submitted so far has executed.
    ///
    /// # Panics
    /// Re-raises on the calling thread the first panic raised by a command
    /// submitted through [`CommandQueue::enqueue`] since the last `finish`.
    pub fn finish(&self) {
        self.wait_idle();
        reraise(&self.failure);
    }

    fn wait_idle(&self) {
        let (done, wait) = bounded(1);
        if self.sender.send(Command::Fence(done)).is_ok() {
            let _ = wait.recv();
        }
    }

    /// Run `f` with a scope whose commands may borrow anything that outlives
    /// this call. The queue is drained before `scope` returns, including when
    /// `f` panics.
    ///
    /// # Panics
    /// Re-raises the first panic raised by a command of this scope. Panics
    /// of commands submitted elsewhere are left to their submitters.
    pub fn scope<'env, R>(&'env self, f: impl FnOnce(&QueueScope<'env>) -> R) -> R {
        let scope = QueueScope {
            queue: self,
            failure: FailureSlot::default(),
            _invariant: PhantomData,
        };
        let guard = DrainOnUnwind {
            queue: self,
            failure: &scope.failure,
        };
        let result = f(&scope);
        std::mem::forget(guard);
        self.wait_idle();
        reraise(&scope.failure);
        result
    }
}

fn reraise(failure: &FailureSlot) {
    let payload = failure.lock().take();
    if let Some(payload) = payload {
        panic::resume_unwind(payload);
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("name", &self.name)
            .field("submitted", &self.submitted())
            .finish()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(device) = self.device.lock().take() {
            let _ = device.join();
        }
    }
}

struct DrainOnUnwind<'q> {
    queue: &'q CommandQueue,
    failure: &'q FailureSlot,
}

impl Drop for DrainOnUnwind<'_> {
    fn drop(&mut self) {
        self.queue.wait_idle();
        // Already unwinding; a command's panic would only abort.
        self.failure.lock().take();
    }
}

/// Submission handle for commands that borrow from the enclosing
/// [`CommandQueue::scope`] call.
pub struct QueueScope<'env> {
    queue: &'env CommandQueue,
    failure: FailureSlot,
    _invariant: PhantomData<&'env mut &'env ()>,
}

impl<'env> QueueScope<'env> {
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'env,
    {
        let job: Box<dyn FnOnce() + Send + 'env> = Box::new(job);
        // SAFETY: `CommandQueue::scope` drains the queue before returning or
        // unwinding, so the job has run (or been dropped) before any borrow
        // it holds can expire.
        let job: Job = unsafe { std::mem::transmute(job) };
        self.queue.submit(job, &self.failure);
    }

    pub fn queue(&self) -> &CommandQueue {
        self.queue
    }
}
