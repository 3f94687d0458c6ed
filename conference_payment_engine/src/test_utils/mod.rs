//! Helpers for integration tests. Enabled with the `test_utils` feature.
mod mock_gateway;
pub mod prepare_env;

pub use mock_gateway::MockGateway;
