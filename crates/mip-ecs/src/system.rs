//! Per-step update routines.
//!
//! A [`System`] is run once per [`Manager::step`](crate::manager::Manager::step),
//! in registration order, with exclusive access to the manager. There is no
//! dependency graph and no isolation: whatever system *k* writes is visible to
//! system *k + 1* in the same step.

use std::any::Any;
use std::time::Duration;

use crate::manager::Manager;

/// A polymorphic update routine.
pub trait System: 'static {
    /// Advance this system by `dt` seconds.
    fn update(&mut self, manager: &mut Manager, dt: f32);

    /// Name used in diagnostics and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// FnSystem
// ---------------------------------------------------------------------------

/// A named closure registered with
/// [`Manager::register_fn_system`](crate::manager::Manager::register_fn_system).
pub struct FnSystem<F> {
    name: String,
    func: F,
}

impl<F> FnSystem<F>
where
    F: FnMut(&mut Manager, f32) + 'static,
{
    pub fn new(name: &str, func: F) -> Self {
        Self {
            name: name.to_owned(),
            func,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: FnMut(&mut Manager, f32) + 'static,
{
    fn update(&mut self, manager: &mut Manager, dt: f32) {
        (self.func)(manager, dt);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Type-erased system storage
// ---------------------------------------------------------------------------

/// Object-safe wrapper that also supports downcasting back to `S`.
pub(crate) trait AnySystem {
    fn run(&mut self, manager: &mut Manager, dt: f32);
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> AnySystem for S {
    fn run(&mut self, manager: &mut Manager, dt: f32) {
        self.update(manager, dt);
    }

    fn name(&self) -> &str {
        System::name(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// StepDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last step.
#[derive(Debug, Clone, Default)]
pub struct StepDiagnostics {
    /// Wall-clock time per system (in order of execution), including the
    /// deferred commands it queued.
    pub system_times: Vec<(String, Duration)>,
    /// Total time for the step.
    pub total_time: Duration,
}
