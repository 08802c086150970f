//! Cooperative, externally polled tasks for scripted behavior.
//!
//! A [`Task<C>`] is a resumable step function with captured state. Each
//! [`resume`](Task::resume) runs it up to its next [`Step`]: either a timed
//! suspension or completion. The task keeps no clock of its own; a
//! [`TaskDriver`] owns the countdown and decides when to resume, which lets
//! one polling system drive any number of tasks.
//!
//! # Example
//!
//! ```
//! use mip_ecs::task::{Poll, Sequence, TaskDriver};
//!
//! let task = Sequence::new()
//!     .then_wait(2.0, |log: &mut Vec<String>| log.push("open door".into()))
//!     .then_wait(3.0, |log: &mut Vec<String>| log.push("close door".into()))
//!     .into_task();
//!
//! let mut log = Vec::new();
//! let mut driver = TaskDriver::new(task);
//! assert_eq!(driver.start(&mut log), Poll::Resumed);
//! assert_eq!(driver.tick(1.0, &mut log), Poll::Pending);
//! assert_eq!(driver.tick(1.0, &mut log), Poll::Resumed);
//! assert_eq!(log, vec!["open door", "close door"]);
//! ```

use std::fmt;

use tracing::trace;

/// Outcome of running a task body once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Suspend; the driver should resume after this many seconds.
    Wait(f32),
    /// The task has finished.
    Done,
}

/// Lifecycle of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting to be resumed (including before the first resume).
    Suspended,
    /// Inside a `resume` call.
    Running,
    /// Ran to completion, or was created empty. Terminal.
    Completed,
}

type StepFn<C> = Box<dyn FnMut(&mut C) -> Step>;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A single-threaded resumable unit of scripted logic over a context `C`.
pub struct Task<C> {
    body: Option<StepFn<C>>,
    wait: f32,
    state: TaskState,
}

impl<C> Task<C> {
    /// Wrap a step function. The task starts suspended: `body` does not run
    /// until the first [`resume`](Self::resume).
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut(&mut C) -> Step + 'static,
    {
        Self {
            body: Some(Box::new(body)),
            wait: 0.0,
            state: TaskState::Suspended,
        }
    }

    /// A task with nothing to run. Resuming it reports `false`.
    pub fn empty() -> Self {
        Self {
            body: None,
            wait: 0.0,
            state: TaskState::Completed,
        }
    }

    /// Run until the next suspension or completion.
    ///
    /// Returns `true` if the task suspended (its requested delay is then
    /// available from [`wait_time`](Self::wait_time)) and `false` if it
    /// completed, or had already completed.
    pub fn resume(&mut self, ctx: &mut C) -> bool {
        let Some(body) = self.body.as_mut() else {
            return false;
        };

        self.state = TaskState::Running;
        match body(ctx) {
            Step::Wait(seconds) => {
                self.wait = seconds;
                self.state = TaskState::Suspended;
                true
            }
            Step::Done => {
                // Release captured state now rather than when the owner drops us.
                self.body = None;
                self.wait = 0.0;
                self.state = TaskState::Completed;
                trace!("task finished");
                false
            }
        }
    }

    /// Seconds requested by the most recent suspension.
    #[inline]
    pub fn wait_time(&self) -> f32 {
        self.wait
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == TaskState::Completed
    }
}

impl<C> Default for Task<C> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("state", &self.state)
            .field("wait", &self.wait)
            .finish()
    }
}

impl<C> Drop for Task<C> {
    fn drop(&mut self) {
        if self.body.is_some() {
            trace!("task dropped before completion");
        }
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Builds a [`Task`] from an ordered list of actions.
///
/// Each resume runs the next action and returns its [`Step`]. An action
/// returning [`Step::Done`] ends the task early. A non-looping sequence
/// completes on the resume after its last action; a looping one starts over.
pub struct Sequence<C> {
    actions: Vec<StepFn<C>>,
    looping: bool,
}

impl<C: 'static> Sequence<C> {
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            looping: false,
        }
    }

    /// Append an action that picks its own [`Step`].
    pub fn then<F>(mut self, action: F) -> Self
    where
        F: FnMut(&mut C) -> Step + 'static,
    {
        self.actions.push(Box::new(action));
        self
    }

    /// Append an action followed by a fixed wait.
    pub fn then_wait<F>(self, seconds: f32, mut action: F) -> Self
    where
        F: FnMut(&mut C) + 'static,
    {
        self.then(move |ctx| {
            action(ctx);
            Step::Wait(seconds)
        })
    }

    /// Restart from the first action instead of completing.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_task(self) -> Task<C> {
        let Sequence {
            mut actions,
            looping,
        } = self;
        let mut cursor = 0;
        Task::new(move |ctx| {
            if cursor == actions.len() {
                if !looping || actions.is_empty() {
                    return Step::Done;
                }
                cursor = 0;
            }
            let action = &mut actions[cursor];
            let step = action(ctx);
            cursor += 1;
            step
        })
    }
}

impl<C: 'static> Default for Sequence<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// TaskDriver
// ---------------------------------------------------------------------------

/// What a [`TaskDriver::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Countdown still running; the task was not touched.
    Pending,
    /// The task was resumed and suspended again.
    Resumed,
    /// The task was resumed and completed during this tick.
    Finished,
    /// The driver has nothing left to run.
    Idle,
}

/// Countdown-based scheduler for one [`Task`].
///
/// Every tick subtracts `dt`; once the countdown is at or below zero the task
/// is resumed and the countdown reloaded from the task's requested wait.
pub struct TaskDriver<C> {
    task: Task<C>,
    countdown: f32,
    active: bool,
}

impl<C> TaskDriver<C> {
    /// Drive `task`, resuming it on the first tick.
    pub fn new(task: Task<C>) -> Self {
        let active = !task.is_finished();
        Self {
            task,
            countdown: 0.0,
            active,
        }
    }

    /// Run the task up to its first suspension without advancing time.
    pub fn start(&mut self, ctx: &mut C) -> Poll {
        self.tick(0.0, ctx)
    }

    /// Advance the countdown by `dt` seconds, resuming the task if it ran out.
    pub fn tick(&mut self, dt: f32, ctx: &mut C) -> Poll {
        if !self.active {
            return Poll::Idle;
        }
        self.countdown -= dt;
        if self.countdown > 0.0 {
            return Poll::Pending;
        }
        if self.task.resume(ctx) {
            self.countdown = self.task.wait_time();
            Poll::Resumed
        } else {
            self.active = false;
            Poll::Finished
        }
    }

    /// Seconds until the next resume.
    pub fn countdown(&self) -> f32 {
        self.countdown
    }

    /// Whether the driver will still resume its task.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pause or unpause. A finished task cannot be reactivated.
    pub fn set_active(&mut self, active: bool) {
        self.active = active && !self.task.is_finished();
    }

    pub fn task(&self) -> &Task<C> {
        &self.task
    }
}

impl<C> Default for TaskDriver<C> {
    fn default() -> Self {
        Self::new(Task::empty())
    }
}

impl<C> fmt::Debug for TaskDriver<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDriver")
            .field("task", &self.task)
            .field("countdown", &self.countdown)
            .field("active", &self.active)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
