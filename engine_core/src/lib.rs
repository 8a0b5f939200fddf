//! Ambient services shared by the simulation crates: logging, observer lists
//! and the owning-thread executor.
#![forbid(unsafe_code)]

pub mod logging;
pub mod observers;
pub mod owner_thread;
