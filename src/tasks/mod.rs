//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the caches.
//!
//! # Tasks
//! - Sweep: Removes a bounded number of expired entries per tick

mod sweep;

pub(crate) use sweep::spawn_sweep_task;
