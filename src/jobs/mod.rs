//! Job Supervisor
//!
//! [`Supervisor::submit`] validates a request and hands the job to a
//! background task that owns the worker for the job's whole life: it relays
//! the worker's records to the Log Sink, kills workers stuck on an
//! unavailable live video, and logs one completion record per job.
//!
//! [`spawn_update`] upgrades the downloader packages the same way: started
//! in the background, observable only through the log.

mod models;
mod supervisor;
mod update;

pub use models::{Job, JobOptions, JobOutcome, VideoOptions};
pub use supervisor::{SUPERVISOR_LOGGER, SubmitError, Submitted, Supervisor};
pub use update::{UPDATE_LOGGER, spawn_update};
