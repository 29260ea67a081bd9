//! Request fixtures

mod fixtures;

pub use fixtures::TestRequestFactory;
