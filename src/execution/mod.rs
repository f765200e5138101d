//! Execution Module - gateway adapters, fan-out and the column probe cache

pub mod column_cache;
pub mod executor;
pub mod gateway;
pub mod http_gateway;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use column_cache::ColumnSupportCache;
pub use executor::QueryExecutor;
pub use gateway::{GatewayRequest, GatewayResponse, QueryGateway};
pub use http_gateway::HttpQueryGateway;
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedGateway;
