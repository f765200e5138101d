//! Security Module - campaign access control

pub mod access_control;

pub use access_control::{AccessController, CallerIdentity, CampaignSelection};
