//! Common test utilities and fixtures.

pub mod faults;
pub mod fixtures;
pub mod server;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use server::*;
#[allow(unused_imports)]
pub use faults::*;
