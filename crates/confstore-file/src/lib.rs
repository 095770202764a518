//! Backing files for confstore.
//!
//! - [`AtomicFile`] -- whole-file replace: temp file, 0600, fsync, rename
//! - [`StoreFile`] -- one identified store file with a single-slot,
//!   last-write-wins write buffer
//!
//! # Design Rules
//!
//! 1. A reader sees either the previous or the new content, never a mixture.
//! 2. A failed commit leaves the previously committed content intact.
//! 3. A missing file is "no data", not an error. Every other I/O failure
//!    propagates.

pub mod atomic;
pub mod error;
pub mod store_file;

pub use atomic::{AtomicFile, FILE_MODE};
pub use error::{FileError, FileResult};
pub use store_file::{FailedWritePolicy, StoreFile};
