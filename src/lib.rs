pub mod api;
pub mod config;
pub mod downloads;
pub mod humanize;
pub mod jobs;
pub mod logging;
pub mod observability;
pub mod tail;
pub mod worker;
