//! Signing key material for the broker

pub mod loader;

pub use loader::{load_key_file, parse_key_set};
