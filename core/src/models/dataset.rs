//! Dataset records
//!
//! This module provides the registry's view of a dataset: the fields a
//! creator supplies at upload time and the full record the registry keeps.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionEnvelope;
use crate::error::CoreError;

/// Access tier of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    /// Anyone may read
    Public,

    /// Only the creator may read
    Private,

    /// Creator and purchasers may read
    #[serde(alias = "NFT_Gated")]
    Gated,
}

impl Default for AccessStatus {
    fn default() -> Self {
        AccessStatus::Public
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessStatus::Public => "Public",
            AccessStatus::Private => "Private",
            AccessStatus::Gated => "Gated",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Public" | "public" => Ok(AccessStatus::Public),
            "Private" | "private" => Ok(AccessStatus::Private),
            "Gated" | "gated" | "NFT_Gated" => Ok(AccessStatus::Gated),
            other => Err(CoreError::InvalidInput(format!("unknown access status: {}", other))),
        }
    }
}

/// Fields supplied when a dataset is registered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDataset {
    /// Creator wallet address
    pub creator: String,

    /// Blob store locator
    pub content_id: String,

    /// SHA-256 of the plaintext (hex)
    pub integrity_hash: String,

    /// Display name
    pub name: String,

    /// Original file name, used to pick a content type
    #[serde(default)]
    pub file_name: String,

    /// Free-text description
    pub description: String,

    /// License name
    pub license: String,

    /// Free-text category
    pub category: String,

    /// Tags, in order, duplicates allowed
    pub tags: Vec<String>,

    /// Access tier
    pub access_status: AccessStatus,

    /// Price, only meaningful when gated
    pub price: u64,

    /// Plaintext size in bytes
    pub size_bytes: u64,

    /// Envelope when the stored blob is encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionEnvelope>,
}

/// A registered dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Registry-assigned identifier
    pub id: String,

    /// Creator wallet address
    pub creator: String,

    /// Blob store locator
    pub content_id: String,

    /// SHA-256 of the plaintext (hex)
    pub integrity_hash: String,

    /// Display name
    pub name: String,

    /// Original file name
    #[serde(default)]
    pub file_name: String,

    /// Free-text description
    pub description: String,

    /// License name
    pub license: String,

    /// Free-text category
    pub category: String,

    /// Tags
    pub tags: Vec<String>,

    /// Access tier
    pub access_status: AccessStatus,

    /// Price; zero unless gated
    pub price: u64,

    /// Plaintext size in bytes
    pub size_bytes: u64,

    /// Download counter
    pub downloads: u64,

    /// View counter
    pub views: u64,

    /// Advisory quality score in [0, 100]
    pub trust_score: u8,

    /// Registration time
    pub created_at: DateTime<Utc>,

    /// Last counter update
    pub updated_at: DateTime<Utc>,

    /// Envelope when the stored blob is encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionEnvelope>,
}

impl DatasetRecord {
    /// Build a record from registration fields
    pub fn from_new(id: String, fields: NewDataset, trust_score: u8, now: DateTime<Utc>) -> Self {
        let price = match fields.access_status {
            AccessStatus::Gated => fields.price,
            _ => 0,
        };

        DatasetRecord {
            id,
            creator: fields.creator,
            content_id: fields.content_id,
            integrity_hash: fields.integrity_hash,
            name: fields.name,
            file_name: fields.file_name,
            description: fields.description,
            license: fields.license,
            category: fields.category,
            tags: fields.tags,
            access_status: fields.access_status,
            price,
            size_bytes: fields.size_bytes,
            downloads: 0,
            views: 0,
            trust_score: trust_score.min(100),
            created_at: now,
            updated_at: now,
            encryption: fields.encryption,
        }
    }

    /// Whether the stored blob is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    /// MIME type to serve the plaintext with
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.file_name)
    }

    /// Advance `updated_at`, never moving it backwards
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Listing view of this record
    pub fn summary(&self, high_trust_threshold: u8) -> DatasetSummary {
        DatasetSummary {
            id: self.id.clone(),
            title: self.name.clone(),
            creator: self.creator.clone(),
            trust_score: self.trust_score,
            description: self.description.clone(),
            tags: self.tags.clone(),
            size: format!("{:.2} MB", self.size_bytes as f64 / 1024.0 / 1024.0),
            downloads: self.downloads,
            last_updated: self.updated_at.format("%Y-%m-%d").to_string(),
            license_type: self.license.clone(),
            verified: self.trust_score >= high_trust_threshold,
            content_id: self.content_id.clone(),
        }
    }
}

/// MIME type for a file name, by extension
///
/// Unknown or missing extensions map to `application/octet-stream`.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}

/// Catalog listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// Dataset id
    pub id: String,
    /// Display name
    pub title: String,
    /// Creator wallet address
    pub creator: String,
    /// Trust score
    pub trust_score: u8,
    /// Description
    pub description: String,
    /// Tags
    pub tags: Vec<String>,
    /// Human-readable size
    pub size: String,
    /// Download counter
    pub downloads: u64,
    /// Date of last update
    pub last_updated: String,
    /// License name
    pub license_type: String,
    /// Whether the trust score clears the high-trust threshold
    pub verified: bool,
    /// Blob store locator
    pub content_id: String,
}
