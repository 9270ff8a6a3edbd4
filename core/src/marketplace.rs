//! Marketplace flows
//!
//! This module wires the content protector, the registry, the blob store and
//! (optionally) the chain service into the upload, purchase and download
//! flows the request handlers call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::CoreConfig;
use crate::crypto::{
    address_prefix, hash_hex, verify_hash, AccessClaims, AccessTokenIssuer, ContentProtector,
};
use crate::error::{to_internal_error, CoreError, Result};
use crate::external::{BlobStore, ChainService, PinMetadata, SignedUrl, TransactionId};
use crate::fixtures::demo_datasets;
use crate::models::{AccessStatus, DatasetRecord, DatasetSummary, NewDataset};
use crate::query::DatasetQuery;
use crate::registry::{DatasetRegistry, RegistryStats};
use crate::sources::{ChainSource, FixtureSource, RegistrySource, SourceChain};

/// Module function registering a dataset
pub const CREATE_DATASET: &str = "dataset_registry::create_dataset";

/// Module function recording a purchase
pub const PURCHASE_ACCESS: &str = "dataset_registry::purchase_access";

/// Module function evaluating access
pub const HAS_ACCESS: &str = "dataset_registry::has_access";

/// An upload as received from a creator
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Creator wallet address
    pub owner: String,

    /// Original file name
    pub file_name: String,

    /// File contents
    pub bytes: Vec<u8>,

    /// Display name; defaults to the file name
    pub name: String,

    /// Description
    pub description: String,

    /// License; defaults to MIT
    pub license: String,

    /// Category; defaults to Other
    pub category: String,

    /// Tags
    pub tags: Vec<String>,

    /// Access tier
    pub access_status: AccessStatus,

    /// Price for gated datasets
    pub price: u64,

    /// Encrypt the stored blob for the owner
    pub encrypt: bool,
}

/// Result of an upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The registered dataset
    pub record: DatasetRecord,

    /// Chain registration transaction, when one was submitted and accepted
    pub transaction_id: Option<TransactionId>,
}

/// Result of a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Dataset purchased
    pub dataset_id: String,

    /// Buyer wallet address
    pub buyer: String,

    /// Price paid
    pub price: u64,

    /// Chain transaction, if one was submitted
    pub transaction_id: Option<TransactionId>,

    /// False when the buyer already held access
    pub newly_granted: bool,
}

/// A completed download
#[derive(Debug, Clone)]
pub struct Download {
    /// Dataset display name
    pub name: String,

    /// File name recorded at upload
    pub file_name: String,

    /// MIME type derived from the file name
    pub content_type: &'static str,

    /// Plaintext bytes
    pub bytes: Vec<u8>,

    /// Whether the stored blob was encrypted
    pub encrypted: bool,

    /// Whether the bytes were checked against a recorded digest
    pub verified: bool,
}

/// A page of the catalog
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    /// Source that supplied the candidates
    pub source: Option<String>,

    /// Matching datasets on this page
    pub datasets: Vec<DatasetSummary>,

    /// Registry counters
    pub stats: RegistryStats,
}

struct ChainBinding {
    service: Arc<dyn ChainService>,
    module_address: String,
    signer: String,
}

impl ChainBinding {
    fn function(&self, name: &str) -> String {
        format!("{}::{}", self.module_address, name)
    }
}

type PurchaseKey = (String, String);

/// The marketplace service
pub struct Marketplace {
    config: CoreConfig,
    registry: Arc<DatasetRegistry>,
    protector: ContentProtector,
    tokens: AccessTokenIssuer,
    blobs: Arc<dyn BlobStore>,
    chain: Option<ChainBinding>,
    sources: SourceChain,
    purchase_locks: Mutex<HashMap<PurchaseKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl Marketplace {
    /// Create a marketplace over an existing registry
    pub fn new(
        config: CoreConfig,
        registry: Arc<DatasetRegistry>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        config.validate()?;
        let tokens = AccessTokenIssuer::from_config(&config.tokens)?;
        let protector = ContentProtector::new(&config.protection);
        let sources = Self::default_sources(&config, &registry, None)?;

        Ok(Marketplace {
            config,
            registry,
            protector,
            tokens,
            blobs,
            chain: None,
            sources,
            purchase_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create a marketplace with a fresh registry, seeding the demo
    /// catalogue when configured to
    pub fn from_config(config: CoreConfig, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        let registry = Arc::new(DatasetRegistry::new(config.registry.clone()));
        if config.registry.seed_fixtures {
            registry.seed(demo_datasets())?;
        }
        Self::new(config, registry, blobs)
    }

    /// Attach a chain service; requires a configured module address
    pub fn with_chain(mut self, service: Arc<dyn ChainService>) -> Result<Self> {
        let module_address = self
            .config
            .chain
            .module_address
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| CoreError::Config("chain module address is not configured".to_string()))?;
        let signer = self
            .config
            .chain
            .service_account
            .clone()
            .unwrap_or_else(|| module_address.clone());

        let binding = ChainBinding {
            service,
            module_address,
            signer,
        };
        self.sources = Self::default_sources(&self.config, &self.registry, Some(&binding))?;
        self.chain = Some(binding);
        Ok(self)
    }

    /// Replace the catalog source chain
    pub fn with_sources(mut self, sources: SourceChain) -> Self {
        self.sources = sources;
        self
    }

    fn default_sources(
        config: &CoreConfig,
        registry: &Arc<DatasetRegistry>,
        chain: Option<&ChainBinding>,
    ) -> Result<SourceChain> {
        let mut sources = SourceChain::new();
        if let Some(binding) = chain {
            let mut accounts = Vec::new();
            if let Some(account) = &config.chain.service_account {
                accounts.push(account.clone());
            }
            accounts.push(binding.module_address.clone());
            sources = sources.with(Arc::new(ChainSource::new(
                Arc::clone(&binding.service),
                binding.module_address.clone(),
                accounts,
                &config.registry,
            )));
        }
        Ok(sources
            .with(Arc::new(RegistrySource::new(Arc::clone(registry))))
            .with(Arc::new(FixtureSource::new()?)))
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<DatasetRegistry> {
        &self.registry
    }

    /// Register an upload
    ///
    /// The plaintext digest is recorded as the integrity hash; when
    /// encryption is requested only the ciphertext leaves the process.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        if request.owner.trim().is_empty() {
            return Err(CoreError::InvalidInput("owner address is required".to_string()));
        }
        if request.access_status == AccessStatus::Gated && request.price == 0 {
            return Err(CoreError::InvalidInput(
                "gated datasets require a positive price".to_string(),
            ));
        }

        let name = non_empty_or(&request.name, || {
            non_empty_or(&request.file_name, || "Untitled".to_string())
        });
        let integrity_hash = hash_hex(&request.bytes);
        let size_bytes = request.bytes.len() as u64;

        let (stored, encryption) = if request.encrypt {
            let protector = self.protector.clone();
            let owner = request.owner.clone();
            let bytes = request.bytes;
            let sealed = tokio::task::spawn_blocking(move || protector.encrypt(&bytes, &owner))
                .await
                .map_err(to_internal_error)??;
            (sealed.ciphertext, Some(sealed.envelope))
        } else {
            (request.bytes, None)
        };

        let stored_hash = hash_hex(&stored);
        let mut keyvalues = BTreeMap::new();
        keyvalues.insert("description".to_string(), request.description.clone());
        keyvalues.insert("license".to_string(), request.license.clone());
        keyvalues.insert("category".to_string(), request.category.clone());
        keyvalues.insert("hash".to_string(), stored_hash);
        keyvalues.insert("encrypted".to_string(), encryption.is_some().to_string());

        let content_id = self
            .blobs
            .pin(
                stored,
                PinMetadata {
                    name: format!("DataChain-{}", name),
                    file_name: request.file_name.clone(),
                    keyvalues,
                },
            )
            .await?;

        let record = self.registry.create_dataset(NewDataset {
            creator: request.owner,
            content_id,
            integrity_hash,
            name,
            file_name: request.file_name,
            description: request.description,
            license: non_empty_or(&request.license, || "MIT".to_string()),
            category: non_empty_or(&request.category, || "Other".to_string()),
            tags: request
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            access_status: request.access_status,
            price: request.price,
            size_bytes,
            encryption,
        })?;

        let transaction_id = match &self.chain {
            Some(chain) => match self.register_on_chain(chain, &record).await {
                Ok(tx) => Some(tx),
                Err(e) => {
                    warn!("Chain registration of {} failed, keeping local record: {}", record.id, e);
                    None
                }
            },
            None => None,
        };

        Ok(UploadOutcome {
            record,
            transaction_id,
        })
    }

    async fn register_on_chain(
        &self,
        chain: &ChainBinding,
        record: &DatasetRecord,
    ) -> Result<TransactionId> {
        let args = vec![
            json!(record.content_id),
            json!(record.integrity_hash),
            json!(record.name),
            json!(record.description),
            json!(record.license),
            json!(record.category),
            json!(record.tags),
            json!(record.access_status.to_string()),
            json!(record.price.to_string()),
        ];
        chain
            .service
            .submit(&chain.function(CREATE_DATASET), args, &chain.signer)
            .await
    }

    /// Look up a dataset and count the view
    pub fn view(&self, id: &str) -> Result<DatasetRecord> {
        self.registry.record_view(id)?;
        self.registry.get_dataset(id)
    }

    /// Buy access to a gated dataset
    pub async fn purchase(&self, id: &str, buyer: &str) -> Result<PurchaseReceipt> {
        if buyer.trim().is_empty() {
            return Err(CoreError::InvalidInput("buyer address is required".to_string()));
        }

        let record = self.registry.get_dataset(id)?;
        if record.access_status != AccessStatus::Gated {
            return Err(CoreError::InvalidInput(format!(
                "{} is not available for purchase",
                id
            )));
        }

        // At most one purchase in flight per (dataset, buyer)
        let key = (record.id.clone(), buyer.to_string());
        let key_lock = self.purchase_lock(&key)?;
        let result = {
            let _guard = key_lock.lock().await;
            self.purchase_exclusive(record, buyer).await
        };
        self.release_purchase_lock(&key, &key_lock);
        result
    }

    fn purchase_lock(&self, key: &PurchaseKey) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .purchase_locks
            .lock()
            .map_err(|e| CoreError::Internal(format!("Failed to lock purchases: {}", e)))?;
        Ok(Arc::clone(locks.entry(key.clone()).or_default()))
    }

    fn release_purchase_lock(&self, key: &PurchaseKey, key_lock: &Arc<tokio::sync::Mutex<()>>) {
        match self.purchase_locks.lock() {
            Ok(mut locks) => {
                // Only the map and this caller still hold it
                if Arc::strong_count(key_lock) == 2 {
                    locks.remove(key);
                }
            }
            Err(e) => warn!("Purchase lock table unavailable: {}", e),
        }
    }

    async fn purchase_exclusive(&self, record: DatasetRecord, buyer: &str) -> Result<PurchaseReceipt> {
        let id = record.id.as_str();
        if self.registry.has_access(id, buyer) {
            return Ok(PurchaseReceipt {
                dataset_id: record.id.clone(),
                buyer: buyer.to_string(),
                price: record.price,
                transaction_id: None,
                newly_granted: false,
            });
        }

        let transaction_id = match &self.chain {
            Some(chain) => {
                let args = vec![
                    json!(record.creator),
                    json!(record.id),
                    json!(buyer),
                    json!(record.price.to_string()),
                ];
                let tx = chain
                    .service
                    .submit(&chain.function(PURCHASE_ACCESS), args, &chain.signer)
                    .await
                    .map_err(|e| CoreError::External(format!("purchase transaction failed: {}", e)))?;
                Some(tx)
            }
            None => None,
        };

        let newly_granted = self.registry.grant_purchase(id, buyer)?;
        info!("{} purchased {} for {}", address_prefix(buyer), id, record.price);

        Ok(PurchaseReceipt {
            dataset_id: record.id.clone(),
            buyer: buyer.to_string(),
            price: record.price,
            transaction_id,
            newly_granted,
        })
    }

    /// Evaluate access locally, then on chain when configured
    ///
    /// A chain failure never grants access.
    pub async fn check_access(&self, record: &DatasetRecord, requester: &str) -> bool {
        if self.registry.has_access(&record.id, requester) {
            return true;
        }

        let chain = match &self.chain {
            Some(chain) => chain,
            None => return false,
        };

        let args = vec![json!(requester), json!(record.creator), json!(record.id)];
        match chain.service.view(&chain.function(HAS_ACCESS), args).await {
            Ok(result) => result.first().and_then(Value::as_bool).unwrap_or(false),
            Err(e) => {
                warn!("Chain access check for {} failed: {}", record.id, e);
                false
            }
        }
    }

    /// Issue an access token to a requester who currently has access
    pub async fn issue_token(&self, id: &str, requester: &str) -> Result<String> {
        let record = self.registry.get_dataset(id)?;
        if !self.check_access(&record, requester).await {
            return Err(CoreError::AccessDenied(format!(
                "{} has no access to {}",
                address_prefix(requester),
                id
            )));
        }
        self.tokens.issue(requester, &record.id, &record.content_id)
    }

    async fn authorize(&self, id: &str, token: &str) -> Result<(DatasetRecord, AccessClaims)> {
        let claims = self.tokens.verify(token)?;
        if claims.dataset_id != id {
            return Err(CoreError::AccessDenied("token was issued for another dataset".to_string()));
        }

        let record = self.registry.get_dataset(id)?;
        if !self.check_access(&record, &claims.address).await {
            return Err(CoreError::AccessDenied(format!(
                "{} has no access to {}",
                address_prefix(&claims.address),
                id
            )));
        }
        Ok((record, claims))
    }

    /// Download a dataset
    ///
    /// The requester address comes from the verified token. Encrypted blobs
    /// are opened with that address and checked against the recorded digest.
    pub async fn download(&self, id: &str, token: &str) -> Result<Download> {
        let (record, claims) = self.authorize(id, token).await?;
        let stored = self
            .blobs
            .fetch(&record.content_id)
            .await
            .map_err(missing_blob)?;

        let (bytes, encrypted) = match &record.encryption {
            Some(envelope) => {
                let protector = self.protector.clone();
                let envelope = envelope.clone();
                let address = claims.address.clone();
                let plaintext = tokio::task::spawn_blocking(move || {
                    protector.decrypt(&stored, &address, &envelope)
                })
                .await
                .map_err(to_internal_error)??;
                (plaintext, true)
            }
            None => (stored, false),
        };

        let verified = !record.integrity_hash.is_empty();
        if verified && !verify_hash(&bytes, &record.integrity_hash) {
            return Err(CoreError::Integrity(format!("{} failed integrity verification", id)));
        }

        self.registry.record_download(id)?;

        let content_type = record.content_type();
        Ok(Download {
            name: record.name,
            file_name: record.file_name,
            content_type,
            bytes,
            encrypted,
            verified,
        })
    }

    /// Time-limited gateway URL for an unencrypted dataset
    ///
    /// The lifetime defaults to the configured one and may not exceed the
    /// configured maximum.
    pub async fn signed_url(&self, id: &str, token: &str, ttl_secs: Option<u64>) -> Result<SignedUrl> {
        let max = self.config.gateway.max_signed_url_ttl_secs;
        let ttl = ttl_secs.unwrap_or(self.config.gateway.default_signed_url_ttl_secs);
        if ttl == 0 || ttl > max {
            return Err(CoreError::InvalidInput(format!(
                "signed URL lifetime must be between 1 and {} seconds, got {}",
                max, ttl
            )));
        }

        let (record, _) = self.authorize(id, token).await?;
        if record.is_encrypted() {
            return Err(CoreError::InvalidInput(
                "encrypted datasets are only served through download".to_string(),
            ));
        }
        self.blobs
            .signed_url(&record.content_id, ttl)
            .await
            .map_err(missing_blob)
    }

    /// Run a catalog query over the source chain
    pub async fn browse(&self, query: &DatasetQuery) -> Result<CatalogPage> {
        let result = self.sources.fetch(query.creator.as_deref()).await;
        let threshold = self.config.registry.high_trust_threshold;

        Ok(CatalogPage {
            source: result.source,
            datasets: query
                .apply(result.datasets)
                .iter()
                .map(|d| d.summary(threshold))
                .collect(),
            stats: self.registry.stats()?,
        })
    }

    /// Registry counters
    pub fn stats(&self) -> Result<RegistryStats> {
        self.registry.stats()
    }
}

/// A registered dataset whose blob is gone is a storage fault, not an
/// unknown dataset
fn missing_blob(err: CoreError) -> CoreError {
    match err {
        CoreError::NotFound(what) => CoreError::External(format!("stored blob is missing: {}", what)),
        other => other,
    }
}

fn non_empty_or<F: FnOnce() -> String>(value: &str, fallback: F) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}
