use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use thiserror::Error;

use crate::{
    game::world::{BlockBuffer, ChunkGenerator, ChunkMeshRaw, LightBuffer},
    misc::pos::ChunkPos,
};

const THREAD_SLEEP_TIME: u64 = 10;

/// Tag of a submitted job. Results are only applied if their id is still the one on record.
pub type JobId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    Terrain,
    Mesh,
}

pub enum Job {
    Terrain {
        chunk_pos: ChunkPos,
        id: JobId,
    },
    Mesh {
        chunk_pos: ChunkPos,
        id: JobId,
        blocks: Arc<BlockBuffer>,
        lights: Arc<LightBuffer>,
    },
}

impl Job {
    pub fn chunk_pos(&self) -> ChunkPos {
        match self {
            Job::Terrain { chunk_pos, .. } | Job::Mesh { chunk_pos, .. } => *chunk_pos,
        }
    }

    pub fn id(&self) -> JobId {
        match self {
            Job::Terrain { id, .. } | Job::Mesh { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            Job::Terrain { .. } => JobKind::Terrain,
            Job::Mesh { .. } => JobKind::Mesh,
        }
    }
}

#[derive(Debug)]
pub enum JobOutput {
    Terrain(BlockBuffer),
    Mesh(ChunkMeshRaw),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{kind:?} job for chunk {chunk_pos:?} panicked: {message}")]
    Panicked {
        kind: JobKind,
        chunk_pos: ChunkPos,
        message: String,
    },
    #[error("Worker pool is shut down")]
    PoolClosed,
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

pub struct JobReturn {
    pub chunk_pos: ChunkPos,
    pub id: JobId,
    pub kind: JobKind,
    pub result: Result<JobOutput, JobError>,
}

/// Fixed set of named threads pulling jobs from one shared queue.
pub struct WorkerPool {
    job_sender: UnboundedSender<Job>,
    result_reciever: UnboundedReceiver<JobReturn>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, generator: Arc<dyn ChunkGenerator>) -> Result<Self, JobError> {
        let (job_sender, job_reciever) = unbounded::<Job>();
        let (result_sender, result_reciever) = unbounded::<JobReturn>();
        let job_reciever = Arc::new(Mutex::new(job_reciever));

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count.max(1) {
            let job_reciever = job_reciever.clone();
            let result_sender = result_sender.clone();
            let generator = generator.clone();

            let spawned = thread::Builder::new()
                .name(format!("Chunk worker {i}"))
                .spawn(move || loop {
                    let next = job_reciever.lock().unwrap_or_else(PoisonError::into_inner).try_next();

                    match next {
                        Ok(Some(job)) => {
                            if result_sender.unbounded_send(run_job(job, generator.as_ref())).is_err() {
                                break;
                            }
                        }
                        // Queue closed and drained.
                        Ok(None) => break,
                        Err(_) => thread::sleep(Duration::from_millis(THREAD_SLEEP_TIME)),
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    job_sender.close_channel();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        log::info!("Started {} chunk workers", workers.len());

        Ok(Self {
            job_sender,
            result_reciever,
            workers,
        })
    }

    pub fn submit(&self, job: Job) -> Result<(), JobError> {
        self.job_sender.unbounded_send(job).map_err(|_| JobError::PoolClosed)
    }

    /// Every result that finished since the last call, without blocking.
    pub fn collect_finished(&mut self) -> Vec<JobReturn> {
        collect_messages(&mut self.result_reciever)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.job_sender.is_closed()
    }

    /// Stops accepting jobs, lets the queued ones finish and joins every worker.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.job_sender.close_channel();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().map(str::to_string);
            if handle.join().is_err() {
                log::error!("Worker thread {:?} exited abnormally", name)
            }
        }
        log::info!("Chunk workers stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown()
    }
}

fn run_job(job: Job, generator: &dyn ChunkGenerator) -> JobReturn {
    let (chunk_pos, id, kind) = (job.chunk_pos(), job.id(), job.kind());

    let result = panic::catch_unwind(AssertUnwindSafe(|| match job {
        Job::Terrain { chunk_pos, .. } => JobOutput::Terrain(generator.generate(chunk_pos)),
        Job::Mesh {
            chunk_pos, blocks, lights, ..
        } => JobOutput::Mesh(ChunkMeshRaw::build(chunk_pos, &blocks, &lights)),
    }))
    .map_err(|payload| JobError::Panicked {
        kind,
        chunk_pos,
        message: panic_message(payload.as_ref()),
    });

    JobReturn {
        chunk_pos,
        id,
        kind,
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn collect_messages<T>(reciever: &mut UnboundedReceiver<T>) -> Vec<T> {
    let mut out = Vec::new();

    while let Ok(Some(msg)) = reciever.try_next() {
        out.push(msg)
    }

    out
}
