//! A fixed pool of worker threads, started once and reused for every
//! job.  Each worker owns a one-slot command channel; all of them
//! answer on a single acknowledgment channel, exactly once per command.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

/// A unit of work every worker runs once per broadcast.
pub trait Task: Send + Sync {
    /// Runs as worker `worker` of `workers`.
    fn run(&self, worker: usize, workers: usize);
}

/// What a worker is told to do next.
pub enum Command {
    /// Run the task, then acknowledge.
    Run(Arc<dyn Task>),
    /// Leave the worker loop.
    Exit,
}

/// A worker's report that it finished a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    /// Which worker is reporting.
    pub worker: usize,
    /// False if the task panicked.
    pub ok: bool,
}

/// The pool.  Dropping it stops and joins every worker.
pub struct WorkerPool {
    commands: Vec<Sender<Command>>,
    acks: Receiver<Ack>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `threads` workers.
    pub fn new(threads: usize) -> io::Result<WorkerPool> {
        let (ack_tx, acks) = channel::unbounded();
        let mut commands = Vec::with_capacity(threads);
        let mut handles = Vec::with_capacity(threads);

        for worker in 0..threads {
            let (tx, rx) = channel::bounded(1);
            let ack_tx = ack_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("fracgen-worker-{}", worker))
                .spawn(move || worker_loop(worker, threads, rx, ack_tx))?;
            commands.push(tx);
            handles.push(handle);
        }
        debug!("Started {} workers", threads);

        Ok(WorkerPool {
            commands,
            acks,
            handles,
        })
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.commands.len()
    }

    /// Hands `task` to every worker.
    pub fn broadcast(&self, task: Arc<dyn Task>) {
        for tx in &self.commands {
            if tx.send(Command::Run(task.clone())).is_err() {
                warn!("A worker has gone away; its share of the job is lost");
            }
        }
    }

    /// Blocks until every worker has acknowledged the last broadcast,
    /// calling `tick` every `poll` while it waits.  Returns how many
    /// workers failed.
    pub fn wait<F: FnMut()>(&self, poll: Duration, mut tick: F) -> usize {
        let mut pending = self.size();
        let mut failures = 0;
        while pending > 0 {
            match self.acks.recv_timeout(poll) {
                Ok(ack) => {
                    pending -= 1;
                    if !ack.ok {
                        error!("Worker {} failed", ack.worker);
                        failures += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    failures += pending;
                    break;
                }
            }
        }
        failures
    }

    /// Broadcasts `task` and waits for it.
    pub fn run(&self, task: Arc<dyn Task>, poll: Duration, tick: impl FnMut()) -> usize {
        self.broadcast(task);
        self.wait(poll, tick)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for tx in &self.commands {
            let _ = tx.send(Command::Exit);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(worker: usize, workers: usize, commands: Receiver<Command>, acks: Sender<Ack>) {
    while let Ok(command) = commands.recv() {
        match command {
            Command::Run(task) => {
                let ok = panic::catch_unwind(AssertUnwindSafe(|| task.run(worker, workers))).is_ok();
                if acks.send(Ack { worker, ok }).is_err() {
                    break;
                }
            }
            Command::Exit => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Count(AtomicUsize);

    impl Task for Count {
        fn run(&self, _worker: usize, _workers: usize) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Seen(Mutex<Vec<(usize, usize)>>);

    impl Task for Seen {
        fn run(&self, worker: usize, workers: usize) {
            self.0.lock().unwrap().push((worker, workers));
        }
    }

    struct Explode;

    impl Task for Explode {
        fn run(&self, worker: usize, _workers: usize) {
            if worker == 0 {
                panic!("boom");
            }
        }
    }

    #[test]
    fn every_worker_runs_every_broadcast() {
        let pool = WorkerPool::new(4).unwrap();
        let task = Arc::new(Count(AtomicUsize::new(0)));
        for _ in 0..3 {
            assert_eq!(pool.run(task.clone(), Duration::from_millis(10), || ()), 0);
        }
        assert_eq!(task.0.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn workers_know_their_index() {
        let pool = WorkerPool::new(3).unwrap();
        let task = Arc::new(Seen(Mutex::new(Vec::new())));
        pool.run(task.clone(), Duration::from_millis(10), || ());
        let mut seen = task.0.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
    }

    #[test]
    fn a_panicking_task_is_reported_and_the_pool_survives() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.run(Arc::new(Explode), Duration::from_millis(10), || ()), 1);
        let task = Arc::new(Count(AtomicUsize::new(0)));
        assert_eq!(pool.run(task.clone(), Duration::from_millis(10), || ()), 0);
        assert_eq!(task.0.load(Ordering::SeqCst), 2);
    }
}
