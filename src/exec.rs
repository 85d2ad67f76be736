//! Scoped join-all executor.
//!
//! Both concurrent spots in the core (the fan-out sink and the after-effect batch)
//! hand a bounded list of tasks to [`Executor::join_all`]. Every task runs to completion,
//! no sibling is cancelled when another fails, and nothing outlives the call.
//! Failures come back as one [`MultiError`] in task order.

use crate::config::ExecMode;
use crate::error::MultiError;
use anyhow::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// A unit of work for [`Executor::join_all`]. May borrow from the caller's stack.
pub(crate) type Task<'a> = Box<dyn FnOnce() -> Result<()> + Send + 'a>;

/// An [`ExecMode`] resolved to something that can run tasks.
///
/// A dedicated pool is built once here and shared by every clone, so a pipeline
/// executed many times keeps using the same workers.
#[derive(Clone, Debug)]
pub(crate) struct Executor {
    mode: ExecMode,
    pool: Option<Arc<ThreadPool>>,
}

impl Executor {
    pub(crate) fn new(mode: ExecMode) -> Self {
        let pool = match mode {
            ExecMode::Parallel { threads: Some(n) } => {
                match ThreadPoolBuilder::new()
                    .num_threads(n.max(1))
                    .thread_name(|i| format!("ironflow-worker-{i}"))
                    .build()
                {
                    Ok(pool) => Some(Arc::new(pool)),
                    Err(e) => {
                        tracing::warn!(error = %e, threads = n, "could not build worker pool, using the global pool");
                        None
                    }
                }
            }
            _ => None,
        };
        tracing::debug!(?mode, workers = mode.worker_count(), "executor ready");
        Self { mode, pool }
    }

    pub(crate) fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Run every task and wait for all of them.
    pub(crate) fn join_all(&self, tasks: Vec<Task<'_>>) -> Result<(), MultiError> {
        if tasks.is_empty() {
            return Ok(());
        }

        let results: Vec<Result<()>> = match (self.mode, &self.pool) {
            (ExecMode::Sequential, _) => tasks.into_iter().map(|t| t()).collect(),
            (ExecMode::Parallel { .. }, Some(pool)) => pool.install(|| run_par(tasks)),
            (ExecMode::Parallel { .. }, None) => run_par(tasks),
        };

        let errors: Vec<anyhow::Error> = results.into_iter().filter_map(Result::err).collect();
        match MultiError::from_errors(errors) {
            Some(m) => Err(m),
            None => Ok(()),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecMode::default())
    }
}

fn run_par(tasks: Vec<Task<'_>>) -> Vec<Result<()>> {
    // Indexed collect keeps task order regardless of completion order.
    tasks.into_par_iter().map(|t| t()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn modes() -> [ExecMode; 3] {
        [
            ExecMode::Sequential,
            ExecMode::Parallel { threads: None },
            ExecMode::Parallel { threads: Some(2) },
        ]
    }

    #[test]
    fn every_task_runs_even_when_one_fails() {
        for mode in modes() {
            let ran = AtomicUsize::new(0);
            let tasks: Vec<Task<'_>> = (0..5)
                .map(|i| {
                    let ran = &ran;
                    Box::new(move || {
                        ran.fetch_add(1, Ordering::SeqCst);
                        if i == 1 || i == 3 {
                            bail!("task {i} failed");
                        }
                        Ok(())
                    }) as Task<'_>
                })
                .collect();

            let err = Executor::new(mode).join_all(tasks).unwrap_err();
            assert_eq!(ran.load(Ordering::SeqCst), 5, "mode {mode:?}");
            assert_eq!(err.len(), 2);
            assert_eq!(err.first().to_string(), "task 1 failed");
            assert_eq!(err.errors()[1].to_string(), "task 3 failed");
        }
    }

    #[test]
    fn empty_group_succeeds() {
        assert!(Executor::default().join_all(Vec::new()).is_ok());
    }

    #[test]
    fn dedicated_pool_is_built_once_and_shared() {
        let exec = Executor::new(ExecMode::Parallel { threads: Some(2) });
        let copy = exec.clone();
        match (&exec.pool, &copy.pool) {
            (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("expected a dedicated pool, got {other:?}"),
        }

        for _ in 0..3 {
            let seen = std::sync::Mutex::new(Vec::new());
            let tasks: Vec<Task<'_>> = (0..4)
                .map(|_| {
                    let seen = &seen;
                    Box::new(move || {
                        seen.lock().unwrap().push(rayon::current_num_threads());
                        Ok(())
                    }) as Task<'_>
                })
                .collect();
            copy.join_all(tasks).unwrap();
            assert!(seen.into_inner().unwrap().iter().all(|&n| n == 2));
        }
    }

    #[test]
    fn sequential_runs_on_the_calling_thread() {
        let caller = std::thread::current().id();
        let seen = std::sync::Mutex::new(Vec::new());
        let tasks: Vec<Task<'_>> = (0..3)
            .map(|_| {
                let seen = &seen;
                Box::new(move || {
                    seen.lock().unwrap().push(std::thread::current().id());
                    Ok(())
                }) as Task<'_>
            })
            .collect();
        Executor::new(ExecMode::Sequential).join_all(tasks).unwrap();
        assert_eq!(seen.into_inner().unwrap(), vec![caller; 3]);
    }
}
