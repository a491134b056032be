// Bounded worker pool for the recursive anchor search.
//
// Tasks are self-contained closures posted over a crossbeam channel. A
// task receives the pool handle so it can submit follow-up work from
// inside a worker; `wait_all` returns once every submitted task (including
// recursively submitted ones) has completed, re-raising the first task
// error on the calling thread. Sibling tasks have no ordering guarantee
// and cancellation is not supported: a submitted task runs to completion.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{AnchorError, Result};

type Task = Box<dyn FnOnce(&PoolHandle) -> Result<()> + Send + 'static>;

enum Message {
    Job(Task),
    Shutdown,
}

struct PoolShared {
    pending: Mutex<usize>,
    all_done: Condvar,
    first_error: Mutex<Option<AnchorError>>,
}

/// Cloneable submission endpoint, also handed to every running task.
#[derive(Clone)]
pub struct PoolHandle {
    sender: Sender<Message>,
    shared: Arc<PoolShared>,
}

impl PoolHandle {
    /// Queue a task. Valid from any thread, including pool workers.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce(&PoolHandle) -> Result<()> + Send + 'static,
    {
        {
            let mut pending = self.shared.pending.lock().unwrap();
            *pending += 1;
        }
        self.sender
            .send(Message::Job(Box::new(task)))
            .expect("worker pool has shut down");
    }
}

/// Fixed-size worker set with a wait-for-all barrier.
pub struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers. A pool of zero workers is a
    /// programming error; callers wanting inline execution skip the pool.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker pool needs at least one worker");

        let (sender, receiver) = unbounded::<Message>();
        let shared = Arc::new(PoolShared {
            pending: Mutex::new(0),
            all_done: Condvar::new(),
            first_error: Mutex::new(None),
        });
        let handle = PoolHandle { sender, shared };

        let workers = (0..worker_count)
            .map(|id| {
                let receiver = receiver.clone();
                let handle = handle.clone();
                thread::Builder::new()
                    .name(format!("anchor-worker-{}", id))
                    .spawn(move || worker_loop(receiver, handle))
                    .expect("failed to spawn pool worker")
            })
            .collect();

        WorkerPool { handle, workers }
    }

    pub fn handle(&self) -> &PoolHandle {
        &self.handle
    }

    /// Queue a task on the pool.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce(&PoolHandle) -> Result<()> + Send + 'static,
    {
        self.handle.submit(task);
    }

    /// Block until every submitted task has completed, then surface the
    /// first error captured from any task.
    pub fn wait_all(&self) -> Result<()> {
        let shared = &self.handle.shared;
        {
            let mut pending = shared.pending.lock().unwrap();
            while *pending > 0 {
                pending = shared.all_done.wait(pending).unwrap();
            }
        }
        match shared.first_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            // Queued jobs drain first; the channel is FIFO.
            let _ = self.handle.sender.send(Message::Shutdown);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(receiver: Receiver<Message>, handle: PoolHandle) {
    loop {
        match receiver.recv() {
            Ok(Message::Job(task)) => {
                let result = task(&handle);
                if let Err(err) = result {
                    let mut slot = handle.shared.first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(err);
                    } else {
                        log::error!("additional worker task error discarded: {}", err);
                    }
                }
                let mut pending = handle.shared.pending.lock().unwrap();
                *pending -= 1;
                if *pending == 0 {
                    handle.shared.all_done.notify_all();
                }
            }
            Ok(Message::Shutdown) | Err(_) => break,
        }
    }
}
