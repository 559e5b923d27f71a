//! Measurement record schema
//!
//! This module defines the long-format input records exported by the
//! wearable and the adapter that turns them into a typed session.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
