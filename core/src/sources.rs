//! Catalog data sources
//!
//! Listings can come from the chain, from the local registry, or from the
//! demo catalogue. Each is a [`DataSource`]; a [`SourceChain`] asks them in
//! priority order and takes the first non-empty answer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, warn};
use serde_json::Value;

use crate::config::RegistryConfig;
use crate::error::{to_source_error, CoreError, Result};
use crate::external::ChainService;
use crate::fixtures::demo_datasets;
use crate::models::{AccessStatus, DatasetRecord};
use crate::registry::DatasetRegistry;

/// Module function listing a creator's datasets
pub const GET_DATASETS_BY_CREATOR: &str = "dataset_registry::get_datasets_by_creator";

/// A provider of catalog candidates
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Name used in logs and results
    fn name(&self) -> &str;

    /// Whether this source only answers unfiltered catalog requests
    fn catalog_only(&self) -> bool {
        false
    }

    /// Candidate datasets, optionally restricted to one creator
    async fn fetch_candidates(&self, creator: Option<&str>) -> Result<Vec<DatasetRecord>>;
}

/// Answer of a [`SourceChain`]
#[derive(Debug, Clone, Default)]
pub struct SourceResult {
    /// Name of the source that answered, if any did
    pub source: Option<String>,

    /// The datasets it returned
    pub datasets: Vec<DatasetRecord>,
}

/// Ordered list of data sources
#[derive(Default, Clone)]
pub struct SourceChain {
    sources: Vec<Arc<dyn DataSource>>,
}

impl SourceChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source at the lowest priority
    pub fn with(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Source names in priority order
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Ask each source in turn; the first non-empty answer wins
    ///
    /// A failing source is logged and skipped.
    pub async fn fetch(&self, creator: Option<&str>) -> SourceResult {
        for source in &self.sources {
            if creator.is_some() && source.catalog_only() {
                continue;
            }

            match source.fetch_candidates(creator).await {
                Ok(datasets) if !datasets.is_empty() => {
                    debug!("{} answered with {} datasets", source.name(), datasets.len());
                    return SourceResult {
                        source: Some(source.name().to_string()),
                        datasets,
                    };
                }
                Ok(_) => debug!("{} had no datasets", source.name()),
                Err(e) => warn!("{} failed: {}", source.name(), e),
            }
        }

        SourceResult::default()
    }
}

/// The local registry as a data source
pub struct RegistrySource {
    registry: Arc<DatasetRegistry>,
}

impl RegistrySource {
    /// Wrap a registry
    pub fn new(registry: Arc<DatasetRegistry>) -> Self {
        RegistrySource { registry }
    }
}

#[async_trait]
impl DataSource for RegistrySource {
    fn name(&self) -> &str {
        "registry"
    }

    async fn fetch_candidates(&self, creator: Option<&str>) -> Result<Vec<DatasetRecord>> {
        match creator {
            Some(creator) => self.registry.list_by_creator(creator),
            None => self.registry.list_all(),
        }
    }
}

/// The demo catalogue as a data source
///
/// Only consulted for unfiltered catalog requests. Counters stay at zero.
pub struct FixtureSource {
    datasets: Vec<DatasetRecord>,
}

impl FixtureSource {
    /// Build the demo catalogue
    pub fn new() -> Result<Self> {
        let registry = DatasetRegistry::default();
        let datasets = registry.seed(demo_datasets())?;
        Ok(FixtureSource { datasets })
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    fn name(&self) -> &str {
        "fixtures"
    }

    fn catalog_only(&self) -> bool {
        true
    }

    async fn fetch_candidates(&self, creator: Option<&str>) -> Result<Vec<DatasetRecord>> {
        Ok(self
            .datasets
            .iter()
            .filter(|d| creator.map_or(true, |c| d.creator == c))
            .cloned()
            .collect())
    }
}

/// The on-chain registry module as a data source
pub struct ChainSource {
    chain: Arc<dyn ChainService>,
    module_address: String,
    default_accounts: Vec<String>,
    base_trust_score: u8,
}

impl ChainSource {
    /// Create a chain source
    ///
    /// Without a creator filter the listing of each default account is tried
    /// in order (typically the service account, then the module account).
    pub fn new(
        chain: Arc<dyn ChainService>,
        module_address: impl Into<String>,
        default_accounts: Vec<String>,
        registry_config: &RegistryConfig,
    ) -> Self {
        ChainSource {
            chain,
            module_address: module_address.into(),
            default_accounts,
            base_trust_score: registry_config.base_trust_score,
        }
    }

    async fn list_for(&self, account: &str) -> Result<Vec<DatasetRecord>> {
        let function = format!("{}::{}", self.module_address, GET_DATASETS_BY_CREATOR);
        let result = self
            .chain
            .view(&function, vec![Value::String(account.to_string())])
            .await?;

        let entries = match result.first() {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(other) => {
                return Err(CoreError::Source(format!(
                    "unexpected view result: {}",
                    other
                )))
            }
        };

        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| decode_chain_dataset(entry, account, i, self.base_trust_score))
            .collect()
    }
}

#[async_trait]
impl DataSource for ChainSource {
    fn name(&self) -> &str {
        "chain"
    }

    async fn fetch_candidates(&self, creator: Option<&str>) -> Result<Vec<DatasetRecord>> {
        if let Some(creator) = creator {
            return self.list_for(creator).await;
        }

        let mut last_error = None;
        for account in &self.default_accounts {
            match self.list_for(account).await {
                Ok(datasets) if !datasets.is_empty() => return Ok(datasets),
                Ok(_) => {}
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// Move u64 values arrive as JSON strings
fn u64_field(entry: &Value, key: &str) -> Option<u64> {
    match entry.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode one on-chain dataset entry
fn decode_chain_dataset(
    entry: &Value,
    owner: &str,
    position: usize,
    trust_score: u8,
) -> Result<DatasetRecord> {
    if !entry.is_object() {
        return Err(to_source_error(format!("dataset entry {} is not an object", position)));
    }

    let id = str_field(entry, "id").unwrap_or_else(|| position.to_string());
    let content_id = str_field(entry, "cid")
        .ok_or_else(|| to_source_error(format!("dataset {} has no cid", id)))?;

    let access_status = match str_field(entry, "status") {
        Some(status) => status.parse::<AccessStatus>()?,
        None => AccessStatus::Public,
    };
    let price = match access_status {
        AccessStatus::Gated => u64_field(entry, "price").unwrap_or(0),
        _ => 0,
    };

    let created_at: DateTime<Utc> = u64_field(entry, "created_at")
        .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single())
        .unwrap_or_else(Utc::now);

    let tags = entry
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(DatasetRecord {
        id,
        creator: str_field(entry, "creator").unwrap_or_else(|| owner.to_string()),
        content_id,
        integrity_hash: str_field(entry, "hash").unwrap_or_default(),
        name: str_field(entry, "name").unwrap_or_else(|| "Untitled Dataset".to_string()),
        file_name: str_field(entry, "file_name").unwrap_or_default(),
        description: str_field(entry, "description").unwrap_or_default(),
        license: str_field(entry, "license").unwrap_or_default(),
        category: str_field(entry, "category").unwrap_or_else(|| "Other".to_string()),
        tags,
        access_status,
        price,
        size_bytes: u64_field(entry, "size").unwrap_or(0),
        downloads: 0,
        views: 0,
        trust_score: trust_score.min(100),
        created_at,
        updated_at: created_at,
        encryption: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MockChainService;
    use crate::models::NewDataset;
    use serde_json::json;

    struct FailingSource;

    #[async_trait]
    impl DataSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn fetch_candidates(&self, _creator: Option<&str>) -> Result<Vec<DatasetRecord>> {
            Err(CoreError::Source("node unreachable".to_string()))
        }
    }

    fn registry_with(creator: &str) -> Arc<DatasetRegistry> {
        let registry = Arc::new(DatasetRegistry::default());
        registry
            .create_dataset(NewDataset {
                creator: creator.to_string(),
                content_id: "QmLocal".to_string(),
                name: "Local".to_string(),
                ..Default::default()
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let chain = SourceChain::new()
            .with(Arc::new(FailingSource))
            .with(Arc::new(RegistrySource::new(registry_with("0xA"))));

        let result = chain.fetch(None).await;
        assert_eq!(result.source.as_deref(), Some("registry"));
        assert_eq!(result.datasets.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_source_falls_through_to_fixtures() {
        let chain = SourceChain::new()
            .with(Arc::new(RegistrySource::new(Arc::new(DatasetRegistry::default()))))
            .with(Arc::new(FixtureSource::new().unwrap()));

        assert_eq!(chain.names(), vec!["registry", "fixtures"]);

        let result = chain.fetch(None).await;
        assert_eq!(result.source.as_deref(), Some("fixtures"));
        assert!(!result.datasets.is_empty());
    }

    #[tokio::test]
    async fn test_fixtures_skipped_for_creator_queries() {
        let chain = SourceChain::new()
            .with(Arc::new(RegistrySource::new(Arc::new(DatasetRegistry::default()))))
            .with(Arc::new(FixtureSource::new().unwrap()));

        let result = chain
            .fetch(Some("0x1234567890abcdef1234567890abcdef12345678"))
            .await;
        assert!(result.source.is_none());
        assert!(result.datasets.is_empty());
    }

    #[tokio::test]
    async fn test_chain_source_decodes_entries() {
        let mut mock = MockChainService::new();
        mock.expect_view()
            .withf(|function, args| {
                function == "0xmod::dataset_registry::get_datasets_by_creator"
                    && args == &vec![json!("0xA")]
            })
            .returning(|_, _| {
                Ok(vec![json!([
                    {
                        "id": "7",
                        "cid": "QmChain",
                        "hash": "abcd",
                        "name": "On-chain rows",
                        "tags": ["a", "b"],
                        "status": "NFT_Gated",
                        "price": "25",
                        "size": "2048",
                        "created_at": "1714564800"
                    }
                ])])
            });

        let source = ChainSource::new(Arc::new(mock), "0xmod", vec![], &RegistryConfig::default());
        let datasets = source.fetch_candidates(Some("0xA")).await.unwrap();

        assert_eq!(datasets.len(), 1);
        let d = &datasets[0];
        assert_eq!(d.id, "7");
        assert_eq!(d.creator, "0xA");
        assert_eq!(d.access_status, AccessStatus::Gated);
        assert_eq!(d.price, 25);
        assert_eq!(d.size_bytes, 2048);
        assert_eq!(d.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(d.created_at.timestamp(), 1_714_564_800);
        assert_eq!(d.downloads, 0);
    }

    #[tokio::test]
    async fn test_chain_source_tries_default_accounts_in_order() {
        let mut mock = MockChainService::new();
        mock.expect_view()
            .withf(|_, args| args == &vec![json!("0xservice")])
            .returning(|_, _| Ok(vec![json!([])]));
        mock.expect_view()
            .withf(|_, args| args == &vec![json!("0xmod")])
            .returning(|_, _| Ok(vec![json!([{ "id": "1", "cid": "QmModule" }])]));

        let source = ChainSource::new(
            Arc::new(mock),
            "0xmod",
            vec!["0xservice".to_string(), "0xmod".to_string()],
            &RegistryConfig::default(),
        );
        let datasets = source.fetch_candidates(None).await.unwrap();

        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].content_id, "QmModule");
        assert_eq!(datasets[0].creator, "0xmod");
    }

    #[tokio::test]
    async fn test_chain_source_rejects_malformed_entries() {
        let mut mock = MockChainService::new();
        mock.expect_view()
            .returning(|_, _| Ok(vec![json!([{ "id": "1" }])]));

        let source = ChainSource::new(Arc::new(mock), "0xmod", vec![], &RegistryConfig::default());
        let err = source.fetch_candidates(Some("0xA")).await.unwrap_err();
        assert!(matches!(err, CoreError::Source(_)));
    }
}
