//! Filesystem helpers shared by the checkpoint store, the run-directory
//! writers and the quarantine pipeline.

pub mod atomic;
pub mod names;
mod transfer;

pub use atomic::atomic_write;
pub use names::{next_free_path, safe_filename};
pub use transfer::{copy_entry, move_entry};
