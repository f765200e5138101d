//! Filters Module - capability-aware filter injection

pub mod capability;
pub mod filter_set;
pub mod injector;

pub use capability::{CapabilityMap, TableCapabilities};
pub use filter_set::FilterSet;
pub use injector::FilterInjector;
