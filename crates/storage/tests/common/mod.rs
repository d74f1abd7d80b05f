pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{backdate, body_of, seeded_bytes};
