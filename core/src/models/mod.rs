//! Data models for the dataset registry
//!
//! This module provides data structures for representing datasets,
//! their access tiers, and purchase grants.

mod dataset;
mod grant;

pub use dataset::{content_type_for, AccessStatus, DatasetRecord, DatasetSummary, NewDataset};
pub use grant::AccessGrant;
