//! Execution controller
//!
//! Drives one execution: arms the interruption checkpoint with a deadline
//! and/or a cancellation token, runs the engine on a dedicated thread with
//! a large stack, and classifies the result. A missed deadline or a fired
//! token becomes its own outcome instead of a guest exception.
//!
//! ```text
//! Idle -> Running -> Completed | Failed | TimedOut | Cancelled
//! ```

use crate::capability::CapabilitySet;
use crate::config::DEFAULT_STACK_SIZE;
use crate::error::RuntimeError;
use crate::interpreter::bridge;
use crate::interpreter::checkpoint::Checkpoint;
use crate::interpreter::machine::Machine;
use crate::interpreter::{ExecResult, Interrupt};
use crate::value::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Where an execution is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// How an execution ended
#[derive(Debug)]
pub enum Outcome {
    /// Finished; expression runs carry their value
    Completed(Option<Value>),
    /// An exception escaped every guest handler
    Failed(RuntimeError),
    TimedOut,
    Cancelled,
}

impl Outcome {
    pub fn phase(&self) -> Phase {
        match self {
            Outcome::Completed(_) => Phase::Completed,
            Outcome::Failed(_) => Phase::Failed,
            Outcome::TimedOut => Phase::TimedOut,
            Outcome::Cancelled => Phase::Cancelled,
        }
    }
}

/// Runs one execution under optional limits
#[derive(Debug)]
pub struct ExecutionController {
    timeout: Option<Duration>,
    token: Option<CancellationToken>,
    stack_size: usize,
    phase: Phase,
}

impl Default for ExecutionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionController {
    pub fn new() -> Self {
        Self {
            timeout: None,
            token: None,
            stack_size: DEFAULT_STACK_SIZE,
            phase: Phase::Idle,
        }
    }

    /// Stop the execution once `timeout` has elapsed
    ///
    /// The deadline is fixed when [`run`](Self::run) starts.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stop the execution when `token` is cancelled
    pub fn cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Stack size of the execution thread; `0` runs on the calling thread
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn limit(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `job` against `machine` and classify how it ended
    pub(crate) fn run<F>(&mut self, machine: &mut Machine, caps: &CapabilitySet, job: F) -> Outcome
    where
        F: FnOnce(&mut Machine, &CapabilitySet, &mut Checkpoint) -> ExecResult + Send,
    {
        let started = Instant::now();
        let mut checkpoint = Checkpoint::new(
            self.timeout.map(|timeout| started + timeout),
            self.token.clone(),
        );
        self.phase = Phase::Running;

        let result = if self.stack_size == 0 {
            job(machine, caps, &mut checkpoint)
        } else {
            self.run_on_thread(machine, caps, &mut checkpoint, job)
        };

        let outcome = match result {
            ExecResult::Completed(value) => {
                Outcome::Completed(value.as_ref().map(bridge::to_value))
            }
            ExecResult::Raised(err) => Outcome::Failed(err),
            ExecResult::Interrupted(Interrupt::TimedOut) => Outcome::TimedOut,
            ExecResult::Interrupted(Interrupt::Cancelled) => Outcome::Cancelled,
        };
        self.phase = outcome.phase();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Outcome::Completed(_) => tracing::debug!(elapsed_ms, "execution completed"),
            Outcome::Failed(err) => tracing::debug!(
                elapsed_ms,
                exception = %err.exception,
                "execution raised"
            ),
            Outcome::TimedOut => tracing::warn!(
                elapsed_ms,
                limit_ms = self.timeout.map(|t| t.as_millis() as u64),
                "execution timed out"
            ),
            Outcome::Cancelled => tracing::info!(elapsed_ms, "execution cancelled"),
        }
        outcome
    }

    fn run_on_thread<F>(
        &self,
        machine: &mut Machine,
        caps: &CapabilitySet,
        checkpoint: &mut Checkpoint,
        job: F,
    ) -> ExecResult
    where
        F: FnOnce(&mut Machine, &CapabilitySet, &mut Checkpoint) -> ExecResult + Send,
    {
        std::thread::scope(|scope| {
            let spawned = std::thread::Builder::new()
                .name("ember-exec".to_string())
                .stack_size(self.stack_size)
                .spawn_scoped(scope, move || job(machine, caps, checkpoint));
            match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    ExecResult::Raised(RuntimeError::other("execution thread panicked"))
                }),
                Err(err) => ExecResult::Raised(RuntimeError::other(format!(
                    "failed to start execution thread: {}",
                    err
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OutputBuffer;
    use crate::interpreter::compile;
    use std::sync::Arc;

    fn machine() -> Machine {
        Machine::new(Arc::new(OutputBuffer::new()), 100)
    }

    #[test]
    fn test_completed_phase() {
        let mut machine = machine();
        let program = compile("x = 1 + 1\n", "main").unwrap();
        let mut controller = ExecutionController::new().stack_size(0);
        assert_eq!(controller.phase(), Phase::Idle);

        let outcome = controller.run(&mut machine, &CapabilitySet::none(), |m, caps, cp| {
            m.execute(&program, caps, cp)
        });
        assert!(matches!(outcome, Outcome::Completed(None)));
        assert_eq!(controller.phase(), Phase::Completed);
    }

    #[test]
    fn test_deadline_interrupts_loop_on_thread() {
        let mut machine = machine();
        let program = compile("while True:\n    pass\n", "spin").unwrap();
        let mut controller =
            ExecutionController::new().timeout(Some(Duration::from_millis(20)));

        let outcome = controller.run(&mut machine, &CapabilitySet::none(), |m, caps, cp| {
            m.execute(&program, caps, cp)
        });
        assert!(matches!(outcome, Outcome::TimedOut));
        assert_eq!(controller.phase(), Phase::TimedOut);
    }

    #[test]
    fn test_cancelled_token_stops_before_first_statement() {
        let mut machine = machine();
        let program = compile("x = 1\n", "main").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let mut controller = ExecutionController::new()
            .stack_size(0)
            .cancellation(Some(token));

        let outcome = controller.run(&mut machine, &CapabilitySet::none(), |m, caps, cp| {
            m.execute(&program, caps, cp)
        });
        assert!(matches!(outcome, Outcome::Cancelled));
        assert!(machine.globals.lock().get("x").is_none());
    }
}
