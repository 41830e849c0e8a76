//! Effects SDK boundary.
//!
//! The segmentation engine is a vendor SDK; everything in the crate talks to it
//! through the traits in [`api`]. `MockEffectsSdk` stands in for the real
//! engine in tests and in the demo binary.

pub mod api;
pub mod mock;
pub mod types;
