//! Test harness

mod host_manager;

pub use host_manager::{decode_all, TestHost};
