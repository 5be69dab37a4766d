//! The asynchronous generation job pipeline.
//!
//! - [`store`]: key/value + list backend seam shared by cache, queue, and
//!   rate limiter, with an in-memory implementation.
//! - [`cache`]: content-addressed result cache.
//! - [`queue`]: three-lane priority job queue with blocking dequeue.
//! - [`rate_limit`]: per-client, per-endpoint admission counters.
//! - [`records`]: job record persistence seam.
//! - [`orchestrator`]: drives one job from admission to a terminal state.
//! - [`worker`]: bounded worker pool consuming the queue.
//!
//! Component-local backend failures surface as [`Outcome::Degraded`],
//! never as errors that abort a job.

pub mod cache;
pub mod orchestrator;
pub mod outcome;
pub mod queue;
pub mod rate_limit;
pub mod records;
pub mod store;
pub mod worker;

pub use cache::ResultCache;
pub use orchestrator::{Orchestrator, RunOutcome, SubmitError, Submission};
pub use outcome::Outcome;
pub use queue::{JobDescriptor, JobQueue, QueueInfo};
pub use rate_limit::{Admission, RateLimitConfig, RateLimiter, Window};
pub use records::{JobRecords, MemoryJobRecords, PgJobRecords, RecordError};
pub use store::{MemoryStore, Store, StoreError};
pub use worker::{WorkerPool, WorkerPoolConfig};
