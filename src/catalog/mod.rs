//! Campaign Catalog Module

pub mod campaign;
pub mod fragments;
pub mod registry;
pub mod standard;

pub use campaign::{Campaign, ChartDefinition, MetricDefinition};
pub use fragments::{Fragment, PeriodStream, StreamKind};
pub use registry::CampaignCatalog;
