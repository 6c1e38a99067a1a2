// Network package
//
// Hosts the sample talked to or looked up. Host vertices for the machines
// the trace describes are created during network discovery; calls add
// `ConnectsTo` (with the port) and `ResolvesHost` relations, creating peers
// on first mention.

pub mod application;
pub mod domain;

pub use domain::{host_data, Endpoint};

use crate::pipeline::Toolchain;

pub fn load(toolchain: &Toolchain) {
    application::register(toolchain.dispatch());
}
