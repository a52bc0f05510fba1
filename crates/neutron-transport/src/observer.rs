//! Progress reporting for the iterative solver.
//!
//! The solver emits a [`SolverEvent`] at every iteration milestone. A
//! [`SolverObserver`] receives them; any `FnMut(&SolverEvent)` closure
//! qualifies through [`FnObserver`].

/// Milestone emitted by the iterative solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverEvent {
    /// One Krylov solve finished. `direction` is set for discrete-ordinates sweeps.
    LinearSolve {
        group: usize,
        direction: Option<usize>,
        iterations: usize,
        residual: f64,
        converged: bool,
    },
    WithinGroupIteration {
        group: usize,
        iteration: usize,
        residual: f64,
    },
    GaussSeidelSweep {
        sweep: usize,
        residual: f64,
    },
    UpscatterCorrection {
        sweep: usize,
        /// Largest |ε| over the nodes.
        epsilon: f64,
    },
    PowerIteration {
        iteration: usize,
        eigenvalue: f64,
        residual: f64,
    },
    /// Non-fatal problem: non-convergence, numerical hazard, linear-solve failure.
    Warning(String),
    Finished {
        converged: bool,
        elapsed_ms: f64,
    },
}

pub trait SolverObserver {
    fn on_event(&mut self, event: &SolverEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl SolverObserver for NoObserver {
    fn on_event(&mut self, _event: &SolverEvent) {}
}

/// Adapts a closure into an observer.
pub struct FnObserver<F> {
    f: F,
}

impl<F> FnObserver<F>
where
    F: FnMut(&SolverEvent),
{
    pub fn new(f: F) -> Self {
        FnObserver { f }
    }
}

impl<F> SolverObserver for FnObserver<F>
where
    F: FnMut(&SolverEvent),
{
    fn on_event(&mut self, event: &SolverEvent) {
        (self.f)(event);
    }
}

/// Records every event; handy in tests and drivers that post-process history.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub events: Vec<SolverEvent>,
}

impl SolverObserver for EventLog {
    fn on_event(&mut self, event: &SolverEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_observer_forwards_events() {
        let mut sweeps = Vec::new();
        {
            let mut obs = FnObserver::new(|e: &SolverEvent| {
                if let SolverEvent::GaussSeidelSweep { sweep, .. } = e {
                    sweeps.push(*sweep);
                }
            });
            obs.on_event(&SolverEvent::GaussSeidelSweep { sweep: 1, residual: 0.5 });
            obs.on_event(&SolverEvent::Warning("x".to_string()));
            obs.on_event(&SolverEvent::GaussSeidelSweep { sweep: 2, residual: 0.1 });
        }
        assert_eq!(sweeps, vec![1, 2]);
    }

    #[test]
    fn test_event_log_records_in_order() {
        let mut log = EventLog::default();
        NoObserver.on_event(&SolverEvent::Warning("ignored".to_string()));
        log.on_event(&SolverEvent::Warning("a".to_string()));
        log.on_event(&SolverEvent::Finished { converged: true, elapsed_ms: 1.0 });
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[0], SolverEvent::Warning("a".to_string()));
    }
}
