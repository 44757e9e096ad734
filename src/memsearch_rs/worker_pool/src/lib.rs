/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! A bounded worker pool.
//!
//! Each query pipeline is driven start to finish by exactly one worker;
//! the pool only bounds how many pipelines run at once. Under safe mode
//! (`concurrent_mode = false`) the pool is constructed disabled and jobs
//! run on the caller thread instead.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool of `size` workers. `size = 0` creates a disabled pool
    /// whose jobs run on the caller thread (safe mode).
    pub fn new(size: usize) -> Self {
        if size == 0 {
            tracing::debug!("worker pool disabled; jobs run on the caller thread");
            return Self {
                sender: None,
                workers: Vec::new(),
            };
        }

        let (sender, receiver): (Sender<Job>, Receiver<Job>) = crossbeam_channel::unbounded();
        let workers = (0..size)
            .map(|id| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("search-worker-{id}"))
                    .spawn(move || worker_loop(id, receiver))
                    .expect("failed to spawn search worker")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn is_disabled(&self) -> bool {
        self.sender.is_none()
    }

    /// Run a job on the pool, or inline when the pool is disabled.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        match &self.sender {
            Some(sender) => {
                // the receiver outlives the sender; send cannot fail
                let _ = sender.send(Box::new(job));
            }
            None => job(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // closing the channel stops the workers after they drain the queue
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(id: usize, receiver: Receiver<Job>) {
    tracing::debug!(worker = id, "search worker started");
    while let Ok(job) = receiver.recv() {
        job();
    }
    tracing::debug!(worker = id, "search worker stopped");
}
