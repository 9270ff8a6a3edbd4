//! Dataset registry
//!
//! This module provides the in-process catalog of dataset records and
//! purchase grants, and evaluates access decisions against it.
//!
//! All state sits behind a single `RwLock`: mutations are serialized so
//! counters never lose increments and ids never collide, and readers always
//! see a state from between two mutations.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::crypto::address_prefix;
use crate::error::{CoreError, Result};
use crate::models::{AccessGrant, AccessStatus, DatasetRecord, NewDataset};

/// Aggregate counters over the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Number of datasets
    pub total_datasets: usize,

    /// Sum of download counters
    pub total_downloads: u64,

    /// Sum of view counters
    pub total_views: u64,

    /// Number of distinct creators
    pub unique_creators: usize,

    /// Datasets at or above the high-trust threshold
    pub high_trust_count: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// Records in creation order
    records: Vec<DatasetRecord>,

    /// Dataset id -> position in `records`
    index: HashMap<String, usize>,

    /// Grants, one per gated dataset
    grants: HashMap<String, AccessGrant>,

    /// Next id sequence number
    next_id: u64,
}

impl RegistryState {
    fn record(&self, id: &str) -> Option<&DatasetRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    fn record_mut(&mut self, id: &str) -> Option<&mut DatasetRecord> {
        match self.index.get(id) {
            Some(&i) => self.records.get_mut(i),
            None => None,
        }
    }
}

/// The dataset registry
#[derive(Debug)]
pub struct DatasetRegistry {
    state: RwLock<RegistryState>,
    config: RegistryConfig,
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl DatasetRegistry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        DatasetRegistry {
            state: RwLock::new(RegistryState {
                next_id: 1,
                ..RegistryState::default()
            }),
            config,
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|e| CoreError::Internal(format!("Failed to read registry: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|e| CoreError::Internal(format!("Failed to write registry: {}", e)))
    }

    /// Initial trust score for a new dataset
    ///
    /// Starts from the configured base and adds five points for each piece of
    /// provenance metadata supplied, capped at 100.
    pub fn initial_trust_score(&self, fields: &NewDataset) -> u8 {
        let bonuses = [
            !fields.description.trim().is_empty(),
            !fields.license.trim().is_empty(),
            !fields.tags.is_empty(),
            !fields.integrity_hash.trim().is_empty(),
        ];
        let bonus = bonuses.iter().filter(|present| **present).count() as u16 * 5;
        (self.config.base_trust_score as u16 + bonus).min(100) as u8
    }

    /// Register a dataset
    ///
    /// Gated datasets get an empty grant in the same critical section, so the
    /// record and its grant appear together or not at all.
    pub fn create_dataset(&self, fields: NewDataset) -> Result<DatasetRecord> {
        if fields.creator.trim().is_empty() {
            return Err(CoreError::InvalidInput("creator address is required".to_string()));
        }
        if fields.access_status == AccessStatus::Gated && fields.price == 0 {
            return Err(CoreError::InvalidInput(
                "gated datasets require a positive price".to_string(),
            ));
        }

        let trust_score = self.initial_trust_score(&fields);
        let mut state = self.write()?;

        let id = format!("dataset_{}", state.next_id);
        if state.index.contains_key(&id) {
            return Err(CoreError::Internal(format!("dataset id {} already allocated", id)));
        }
        state.next_id += 1;

        let record = DatasetRecord::from_new(id.clone(), fields, trust_score, Utc::now());
        if record.access_status == AccessStatus::Gated {
            state.grants.insert(id.clone(), AccessGrant::new(id.clone()));
        }
        let position = state.records.len();
        state.records.push(record.clone());
        state.index.insert(id, position);

        info!(
            "Registered {} ({}) for {}",
            record.id,
            record.access_status,
            address_prefix(&record.creator)
        );

        Ok(record)
    }

    /// Register a batch of datasets, stopping at the first failure
    pub fn seed(&self, datasets: Vec<NewDataset>) -> Result<Vec<DatasetRecord>> {
        let records = datasets
            .into_iter()
            .map(|fields| self.create_dataset(fields))
            .collect::<Result<Vec<_>>>()?;
        info!("Seeded registry with {} datasets", records.len());
        Ok(records)
    }

    /// Look up a dataset by id
    pub fn get_dataset(&self, id: &str) -> Result<DatasetRecord> {
        let state = self.read()?;
        state
            .record(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("dataset {}", id)))
    }

    /// Datasets registered by `creator`, in creation order
    pub fn list_by_creator(&self, creator: &str) -> Result<Vec<DatasetRecord>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.creator == creator)
            .cloned()
            .collect())
    }

    /// All datasets, in creation order
    pub fn list_all(&self) -> Result<Vec<DatasetRecord>> {
        Ok(self.read()?.records.clone())
    }

    /// Number of registered datasets
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.records.len())
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Increment the view counter; returns the new count
    pub fn record_view(&self, id: &str) -> Result<u64> {
        let mut state = self.write()?;
        let record = state
            .record_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("dataset {}", id)))?;
        record.views += 1;
        record.touch(Utc::now());
        Ok(record.views)
    }

    /// Increment the download counter; returns the new count
    pub fn record_download(&self, id: &str) -> Result<u64> {
        let mut state = self.write()?;
        let record = state
            .record_mut(id)
            .ok_or_else(|| CoreError::NotFound(format!("dataset {}", id)))?;
        record.downloads += 1;
        record.touch(Utc::now());
        Ok(record.downloads)
    }

    /// Record a purchase of a gated dataset
    ///
    /// Returns `true` if the purchaser was newly added. Granting twice is not
    /// an error.
    pub fn grant_purchase(&self, dataset_id: &str, purchaser: &str) -> Result<bool> {
        if purchaser.trim().is_empty() {
            return Err(CoreError::InvalidInput("purchaser address is required".to_string()));
        }

        let mut state = self.write()?;
        let grant = state
            .grants
            .get_mut(dataset_id)
            .ok_or_else(|| CoreError::NotFound(format!("access grant for {}", dataset_id)))?;
        let added = grant.add(purchaser);

        debug!(
            "Purchase of {} by {} ({})",
            dataset_id,
            address_prefix(purchaser),
            if added { "granted" } else { "already held" }
        );
        Ok(added)
    }

    /// Snapshot of the grant for a gated dataset
    pub fn access_grant(&self, dataset_id: &str) -> Result<Option<AccessGrant>> {
        Ok(self.read()?.grants.get(dataset_id).cloned())
    }

    /// Evaluate the access policy; unknown datasets grant nothing
    ///
    /// An unreadable registry also grants nothing.
    pub fn has_access(&self, dataset_id: &str, requester: &str) -> bool {
        let state = match self.read() {
            Ok(state) => state,
            Err(e) => {
                warn!("Access check for {} failed: {}", dataset_id, e);
                return false;
            }
        };

        let record = match state.record(dataset_id) {
            Some(record) => record,
            None => return false,
        };

        match record.access_status {
            AccessStatus::Public => true,
            AccessStatus::Private => !requester.is_empty() && requester == record.creator,
            AccessStatus::Gated => {
                if requester.is_empty() {
                    return false;
                }
                requester == record.creator
                    || state
                        .grants
                        .get(dataset_id)
                        .map_or(false, |grant| grant.contains(requester))
            }
        }
    }

    /// Aggregate counters over the current state
    pub fn stats(&self) -> Result<RegistryStats> {
        let state = self.read()?;
        let threshold = self.config.high_trust_threshold;

        let creators: HashSet<&str> = state.records.iter().map(|r| r.creator.as_str()).collect();

        Ok(RegistryStats {
            total_datasets: state.records.len(),
            total_downloads: state.records.iter().map(|r| r.downloads).sum(),
            total_views: state.records.iter().map(|r| r.views).sum(),
            unique_creators: creators.len(),
            high_trust_count: state
                .records
                .iter()
                .filter(|r| r.trust_score >= threshold)
                .count(),
        })
    }
}
