//! Allocation types for `std` and `alloc`-only builds.

#[cfg(feature = "std")]
pub use std::{string::String, vec, vec::Vec};

#[cfg(all(feature = "alloc", not(feature = "std")))]
pub use alloc::{string::String, vec, vec::Vec};
