//! Integration tests: full screening cycles against an in-memory broker.

mod mock_broker;
