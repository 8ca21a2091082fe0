//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a disk tier is open.
//!
//! # Tasks
//! - Disk sweep: removes expired disk tier entries at a configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
