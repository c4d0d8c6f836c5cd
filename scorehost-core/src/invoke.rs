//! Deadline-bound execution of `run()`.
//!
//! `run()` is synchronous user code that cannot be interrupted. Each call
//! runs on tokio's blocking pool and the caller waits on it with a
//! timeout. When the deadline passes the caller gets a timeout right away,
//! but the blocking thread keeps running the abandoned call until it
//! returns on its own. Whatever it holds (memory, file handles, locks) is
//! held until then, and a handler that never returns pins a blocking-pool
//! thread for the life of the process.
//!
//! Outside a tokio runtime there is nothing to run the call on, so it
//! runs inline with no deadline and a warning is logged.

use crate::input::RunArgs;
use crate::response::RunOutput;
use crate::script::{RunCallable, ScriptError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::timeout_at;
use tracing::warn;

static UNBOUNDED_WARNING: Once = Once::new();

/// Outcome of a completed `run()` call.
#[derive(Debug, Clone)]
pub struct TimedResult {
    /// Wall-clock time spent inside `run()`.
    pub elapsed_ms: f64,
    pub input: Arc<RunArgs>,
    pub output: RunOutput,
}

#[derive(Debug, Clone, Copy)]
pub struct DeadlineInvoker {
    timeout: Duration,
}

impl DeadlineInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_millis(timeout_ms: u64) -> Self {
        Self::new(Duration::from_millis(timeout_ms))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Call `run` exactly once.
    ///
    /// The deadline is measured from the moment `run` starts executing. If
    /// no blocking thread picks the call up within the deadline, the
    /// timeout reports an elapsed time of zero.
    pub async fn invoke(&self, run: RunCallable, args: RunArgs) -> Result<TimedResult, ScriptError> {
        if Handle::try_current().is_err() {
            return self.invoke_unbounded(run, args);
        }

        let args = Arc::new(args);
        let task_args = args.clone();
        let (started_tx, started_rx) = oneshot::channel::<Instant>();

        let handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let _ = started_tx.send(started);
            let output = run(&task_args);
            (output, started.elapsed())
        });

        let queued_deadline = tokio::time::Instant::now() + self.timeout;
        let started = match timeout_at(queued_deadline, started_rx).await {
            Ok(Ok(started)) => started,
            // The closure always sends before running user code.
            Ok(Err(_)) => Instant::now(),
            Err(_) => {
                return Err(ScriptError::Timeout {
                    timeout_ms: self.timeout_ms(),
                    elapsed_ms: 0.0,
                });
            }
        };

        let run_deadline = tokio::time::Instant::from_std(started) + self.timeout;
        match timeout_at(run_deadline, handle).await {
            Ok(Ok((Ok(output), elapsed))) => Ok(TimedResult {
                elapsed_ms: as_millis_f64(elapsed),
                input: args,
                output,
            }),
            Ok(Ok((Err(source), _))) => Err(ScriptError::exception(source)),
            Ok(Err(join_err)) => match join_err.try_into_panic() {
                Ok(payload) => Err(ScriptError::from_panic("run()", payload)),
                Err(join_err) => Err(ScriptError::exception(Box::new(join_err))),
            },
            Err(_) => Err(ScriptError::Timeout {
                timeout_ms: self.timeout_ms(),
                elapsed_ms: as_millis_f64(started.elapsed()),
            }),
        }
    }

    /// Call `run` on the current thread without a deadline.
    pub fn invoke_unbounded(&self, run: RunCallable, args: RunArgs) -> Result<TimedResult, ScriptError> {
        UNBOUNDED_WARNING.call_once(|| {
            warn!(
                timeout_ms = self.timeout_ms(),
                "No async runtime available; run() executes without a scoring timeout"
            );
        });

        let started = Instant::now();
        match panic::catch_unwind(AssertUnwindSafe(|| run(&args))) {
            Ok(Ok(output)) => Ok(TimedResult {
                elapsed_ms: as_millis_f64(started.elapsed()),
                input: Arc::new(args),
                output,
            }),
            Ok(Err(source)) => Err(ScriptError::exception(source)),
            Err(payload) => Err(ScriptError::from_panic("run()", payload)),
        }
    }
}

fn as_millis_f64(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn callable<F>(f: F) -> RunCallable
    where
        F: Fn(&RunArgs) -> Result<RunOutput, crate::BoxError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    #[tokio::test]
    async fn test_returns_output_and_input() {
        let invoker = DeadlineInvoker::from_millis(1_000);
        let mut args = RunArgs::new();
        args.push_json("x", json!(3));

        let run = callable(|args| {
            let x = args.json("x").and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(x * 2).into())
        });

        let result = invoker.invoke(run, args).await.unwrap();
        assert!(result.elapsed_ms >= 0.0);
        assert_eq!(result.output.to_json(), json!(6));
        assert_eq!(result.input.json("x"), Some(&json!(3)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_reports_elapsed_at_least_deadline() {
        let invoker = DeadlineInvoker::from_millis(100);
        let run = callable(|_| {
            std::thread::sleep(Duration::from_millis(400));
            Ok(Value::Null.into())
        });

        match invoker.invoke(run, RunArgs::new()).await {
            Err(ScriptError::Timeout { timeout_ms, elapsed_ms }) => {
                assert_eq!(timeout_ms, 100);
                assert!(elapsed_ms >= 100.0, "elapsed {}", elapsed_ms);
                assert!(elapsed_ms < 350.0, "elapsed {}", elapsed_ms);
            }
            other => panic!("expected timeout, got {:?}", other.map(|r| r.elapsed_ms)),
        }
    }

    #[tokio::test]
    async fn test_error_becomes_exception() {
        let invoker = DeadlineInvoker::from_millis(1_000);
        let run = callable(|_| Err("model exploded".into()));

        let err = invoker.invoke(run, RunArgs::new()).await.unwrap_err();
        assert!(matches!(err, ScriptError::Exception { .. }));
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "model exploded"
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_exception() {
        let invoker = DeadlineInvoker::from_millis(1_000);
        let run = callable(|_| panic!("index out of range"));

        let err = invoker.invoke(run, RunArgs::new()).await.unwrap_err();
        assert!(
            std::error::Error::source(&err)
                .unwrap()
                .to_string()
                .contains("index out of range")
        );
    }

    #[test]
    fn test_unbounded_path() {
        let invoker = DeadlineInvoker::from_millis(1);
        let run = callable(|_| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(json!("done").into())
        });

        let result = invoker.invoke_unbounded(run, RunArgs::new()).unwrap();
        assert!(result.elapsed_ms >= 20.0);
        assert_eq!(result.output.to_json(), json!("done"));
    }
}
