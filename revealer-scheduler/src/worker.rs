use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Task),
    Shutdown,
}

/// A dedicated thread pulling closures off a FIFO queue.
///
/// `submit` enqueues and returns immediately; tasks run in submission
/// order on the worker's thread. The in-progress flag distinguishes "queue
/// empty" from "queue empty but a task is still executing", which shutdown
/// relies on before tearing down shared structures.
pub struct Worker {
    name: String,
    tx: Sender<Message>,
    in_progress: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a named worker thread.
    pub fn spawn(name: &str) -> Self {
        let (tx, rx) = unbounded::<Message>();
        let in_progress = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&in_progress);
        let thread_name = name.to_string();
        let handle = thread::spawn(move || {
            tracing::debug!(worker = %thread_name, "worker started");
            for message in rx {
                match message {
                    Message::Run(task) => {
                        flag.store(true, Ordering::SeqCst);
                        task();
                        flag.store(false, Ordering::SeqCst);
                    }
                    Message::Shutdown => break,
                }
            }
            tracing::debug!(worker = %thread_name, "worker stopped");
        });

        Self {
            name: name.to_string(),
            tx,
            in_progress,
            handle: Some(handle),
        }
    }

    /// Enqueue a task and return immediately.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Message::Run(Box::new(task))).is_err() {
            tracing::warn!(worker = %self.name, "task submitted to stopped worker");
        }
    }

    /// True when the queue is empty and no task is executing.
    pub fn is_idle(&self) -> bool {
        self.tx.len() == 0 && !self.in_progress.load(Ordering::SeqCst)
    }

    /// Block until the worker drains its queue and finishes the task in
    /// flight. Cancellation tokens must already be flipped, or this waits
    /// out the full listen windows.
    pub fn wait_idle(&self) {
        while !self.is_idle() {
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Queued tasks still run; Shutdown is just the last message.
        let _ = self.tx.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
