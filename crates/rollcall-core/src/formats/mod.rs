//! # Formats Module
//!
//! Serialization and snapshot handling for rosters.
//!
//! This module contains the binary snapshot format (postcard + header).
//! File I/O stays in the app layer; this module only handles format
//! conversion (pure transformations).

mod persistence;

pub use persistence::*;
