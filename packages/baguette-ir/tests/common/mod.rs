//! Common test utilities for baguette-ir
//!
//! Trace builders, small graph queries and assertions shared by the
//! integration tests.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
