//! src/generator/prefetch.rs
//!
//! Single-slot background worker used to overlap one fetch cycle with the
//! consumption of the previous one.
//!
//! The worker owns one named thread and two bounded channels of capacity 1:
//! - Task channel: caller -> worker (the unit of work, moved in)
//! - Output channel: worker -> caller (the result, moved back)
//!
//! At most one task is outstanding at any time. Submitting a second task
//! before the first result was taken, or waiting when nothing was submitted,
//! means the caller's sequencing is broken; both panic instead of returning an
//! error, since retrying cannot repair them.
//!
//! Dropping the worker waits for an outstanding task to finish before joining
//! the thread. There is no cancellation.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread;

pub(crate) struct PrefetchWorker<Task, Output> {
    worker: Option<thread::JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
    output_rx: Receiver<Output>,
    outstanding: bool,
}

impl<Task, Output> PrefetchWorker<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns the worker thread. `work` runs once per submitted task.
    pub(crate) fn new<F>(name: &str, work: F) -> Result<Self>
    where
        F: Fn(Task) -> Output + Send + 'static,
    {
        let (task_tx, task_rx) = bounded::<Task>(1);
        let (output_tx, output_rx) = bounded::<Output>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Ends once the task sender is dropped.
                for task in task_rx.iter() {
                    if output_tx.send(work(task)).is_err() {
                        break; // Receiver dropped
                    }
                }
            })
            .with_context(|| format!("Failed to spawn prefetch thread '{}'", name))?;

        Ok(Self {
            worker: Some(handle),
            task_tx: Some(task_tx),
            output_rx,
            outstanding: false,
        })
    }

    pub(crate) fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    /// # Panics
    /// If a task is outstanding.
    pub(crate) fn assert_idle(&self) {
        assert!(
            !self.outstanding,
            "attempted to start a background fetch while one is still running"
        );
    }

    /// Hands `task` to the worker thread.
    ///
    /// # Panics
    /// If a task is already outstanding.
    pub(crate) fn submit(&mut self, task: Task) -> Result<()> {
        self.assert_idle();
        let task_tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Prefetch worker is shut down"))?;
        task_tx
            .send(task)
            .map_err(|_| anyhow!("Prefetch worker terminated; cannot submit a fetch"))?;
        self.outstanding = true;
        Ok(())
    }

    /// Blocks until the outstanding task completes and returns its output.
    ///
    /// # Panics
    /// If no task is outstanding.
    pub(crate) fn wait(&mut self) -> Result<Output> {
        assert!(
            self.outstanding,
            "attempted to wait for a background fetch when none is pending"
        );
        self.outstanding = false;
        self.output_rx
            .recv()
            .map_err(|_| anyhow!("Prefetch worker terminated before returning its result"))
    }
}

impl<Task, Output> Drop for PrefetchWorker<Task, Output> {
    fn drop(&mut self) {
        // The task owns state the caller handed over; let it finish.
        if self.outstanding {
            let _ = self.output_rx.recv();
            self.outstanding = false;
        }

        // Closing the task channel ends the worker loop
        self.task_tx.take();

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
