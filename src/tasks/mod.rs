//! Background Tasks Module
//!
//! # Tasks
//! - Cache sweep: proactively removes expired response cache entries

mod sweep;

pub use sweep::spawn_sweep_task;
