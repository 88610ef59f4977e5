// Library exports for the binary, integration tests and reusable components

pub mod api;
pub mod config;
pub mod marathon;
pub mod queue;

// Test support (unit tests, or integration tests with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
