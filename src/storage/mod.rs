//! Storage primitives
//!
//! Atomic temp-then-rename writes shared by backup creation, restore, and
//! the settings file.

pub mod file_io;

pub use file_io::{copy_atomic, read_json, write_json_atomic, Overwrite};
