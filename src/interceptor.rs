//! Interceptors and the per-event pipeline.
//!
//! Every listener attached to a `Device` is an `Interceptor`. For each raw event
//! the device asks each interceptor, in attachment order, for an
//! `InterceptorResponse`. The responses are collected into a `Pipeline`, which
//! settles whether the OS should see the event (`Verdict`) and then runs every
//! deferred action. Suppression is decided before any action runs and never
//! prevents another interceptor's action from running.

use std::fmt;
use std::sync::Arc;

use crate::event::RawEvent;

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// What the backend should do with the event after the pipeline ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the event on to the next hook / the focused application.
    Propagate,
    /// Swallow the event.
    Suppress,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Role of the interceptor that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorKind {
    /// Blocks or synthesizes input. Only this kind can suppress an event.
    Simulation,
    /// Key / mouse subscription dispatch.
    Listener,
    /// Key sequence matching.
    SequenceDetector,
}

/// Work deferred until the pipeline has reached its verdict.
pub type DeferredAction = Box<dyn FnOnce() + Send>;

/// One interceptor's answer for one raw event.
pub struct InterceptorResponse {
    pub should_handle: bool,
    pub kind: InterceptorKind,
    pub action: Option<DeferredAction>,
}

impl InterceptorResponse {
    /// The interceptor handles the event and wants `action` to run.
    pub fn handle(kind: InterceptorKind, action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            should_handle: true,
            kind,
            action: Some(Box::new(action)),
        }
    }

    /// The interceptor has no interest in this event.
    pub fn ignore(kind: InterceptorKind) -> Self {
        Self {
            should_handle: false,
            kind,
            action: None,
        }
    }

    fn suppresses(&self) -> bool {
        self.should_handle && self.kind == InterceptorKind::Simulation
    }
}

impl fmt::Debug for InterceptorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorResponse")
            .field("should_handle", &self.should_handle)
            .field("kind", &self.kind)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Interceptor trait
// ---------------------------------------------------------------------------

/// A party attached to a device's hook.
///
/// Implementations must not hold internal locks across the returned action;
/// the action runs after every interceptor has responded.
pub trait Interceptor: Send + Sync {
    /// Short label used in log messages.
    fn name(&self) -> &'static str;

    /// Produces this interceptor's response for `event`.
    fn on_input(self: Arc<Self>, event: &RawEvent) -> InterceptorResponse;

    /// True once the interceptor no longer needs the hook.
    fn unhook_requested(&self) -> bool;

    /// Called right before the hook is (re)installed. Anything derived from
    /// earlier input is stale: transitions made while unhooked were never seen.
    fn reset(&self) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Ordered responses for a single raw event.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<InterceptorResponse>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stages: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, response: InterceptorResponse) {
        self.stages.push(response);
    }

    /// Verdict the responses collected so far add up to.
    pub fn verdict(&self) -> Verdict {
        if self.stages.iter().any(InterceptorResponse::suppresses) {
            Verdict::Suppress
        } else {
            Verdict::Propagate
        }
    }

    /// Settles the verdict, then runs every handling response's action in order.
    pub fn run(self) -> Verdict {
        let verdict = self.verdict();
        for stage in self.stages {
            if !stage.should_handle {
                continue;
            }
            if let Some(action) = stage.action {
                action();
            }
        }
        verdict
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> DeferredAction) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |label: &'static str| -> DeferredAction {
            let sink = sink.clone();
            Box::new(move || sink.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn empty_pipeline_propagates() {
        assert_eq!(Pipeline::new().run(), Verdict::Propagate);
    }

    #[test]
    fn listener_responses_never_suppress() {
        let mut pipeline = Pipeline::new();
        pipeline.push(InterceptorResponse::handle(InterceptorKind::Listener, || {}));
        pipeline.push(InterceptorResponse::handle(InterceptorKind::SequenceDetector, || {}));
        assert_eq!(pipeline.run(), Verdict::Propagate);
    }

    #[test]
    fn handling_simulation_response_suppresses() {
        let mut pipeline = Pipeline::new();
        pipeline.push(InterceptorResponse::handle(InterceptorKind::Simulation, || {}));
        assert_eq!(pipeline.run(), Verdict::Suppress);
    }

    #[test]
    fn ignoring_simulation_response_does_not_suppress() {
        let mut pipeline = Pipeline::new();
        pipeline.push(InterceptorResponse::ignore(InterceptorKind::Simulation));
        assert_eq!(pipeline.run(), Verdict::Propagate);
    }

    #[test]
    fn actions_run_in_order_even_when_suppressed() {
        let (log, make) = recorder();
        let mut pipeline = Pipeline::new();
        pipeline.push(InterceptorResponse {
            should_handle: true,
            kind: InterceptorKind::Listener,
            action: Some(make("listener")),
        });
        pipeline.push(InterceptorResponse {
            should_handle: true,
            kind: InterceptorKind::Simulation,
            action: Some(make("blocker")),
        });
        pipeline.push(InterceptorResponse {
            should_handle: true,
            kind: InterceptorKind::SequenceDetector,
            action: Some(make("sequence")),
        });

        assert_eq!(pipeline.run(), Verdict::Suppress);
        assert_eq!(*log.lock().unwrap(), vec!["listener", "blocker", "sequence"]);
    }

    #[test]
    fn declined_actions_are_skipped() {
        let (log, make) = recorder();
        let mut pipeline = Pipeline::new();
        pipeline.push(InterceptorResponse {
            should_handle: false,
            kind: InterceptorKind::Listener,
            action: Some(make("declined")),
        });
        pipeline.push(InterceptorResponse {
            should_handle: true,
            kind: InterceptorKind::Listener,
            action: Some(make("taken")),
        });
        pipeline.run();
        assert_eq!(*log.lock().unwrap(), vec!["taken"]);
    }
}
