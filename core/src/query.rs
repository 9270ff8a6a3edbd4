//! Catalog queries
//!
//! Search, tag filtering, sorting and pagination over a candidate set.

use serde::{Deserialize, Serialize};

use crate::models::DatasetRecord;

/// Default page size
pub const DEFAULT_LIMIT: usize = 50;

/// Sort key; all orders are descending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    /// Most downloaded first
    #[default]
    Downloads,
    /// Most trusted first
    TrustScore,
    /// Most viewed first
    Views,
    /// Newest first
    Recent,
    /// Largest first
    Size,
}

impl SortBy {
    /// Parse a sort key; unknown keys fall back to downloads
    pub fn parse(s: &str) -> Self {
        match s {
            "trustScore" => SortBy::TrustScore,
            "views" => SortBy::Views,
            "recent" => SortBy::Recent,
            "size" => SortBy::Size,
            _ => SortBy::Downloads,
        }
    }
}

/// A catalog query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetQuery {
    /// Restrict to one creator
    pub creator: Option<String>,

    /// Case-insensitive text match on name, description and category
    pub search: Option<String>,

    /// Match when any of these is a substring of any dataset tag
    pub tags: Vec<String>,

    /// Sort order
    pub sort_by: SortBy,

    /// Page size
    pub limit: usize,

    /// Page offset
    pub offset: usize,
}

impl Default for DatasetQuery {
    fn default() -> Self {
        DatasetQuery {
            creator: None,
            search: None,
            tags: Vec::new(),
            sort_by: SortBy::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl DatasetQuery {
    /// Parse a comma-separated tag list
    pub fn with_tag_list(mut self, tags: &str) -> Self {
        self.tags = tags
            .split(',')
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    fn matches(&self, dataset: &DatasetRecord) -> bool {
        if let Some(creator) = &self.creator {
            if &dataset.creator != creator {
                return false;
            }
        }

        if let Some(search) = self.search.as_deref().map(str::to_lowercase) {
            if !search.is_empty()
                && ![&dataset.name, &dataset.description, &dataset.category]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&search))
            {
                return false;
            }
        }

        if !self.tags.is_empty() {
            let dataset_tags: Vec<String> = dataset.tags.iter().map(|t| t.to_lowercase()).collect();
            let hit = self.tags.iter().any(|wanted| {
                let wanted = wanted.to_lowercase();
                dataset_tags.iter().any(|tag| tag.contains(&wanted))
            });
            if !hit {
                return false;
            }
        }

        true
    }

    /// Filter, sort and paginate
    ///
    /// Sorting is stable, so ties keep their input order.
    pub fn apply(&self, datasets: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
        let mut selected: Vec<DatasetRecord> =
            datasets.into_iter().filter(|d| self.matches(d)).collect();

        match self.sort_by {
            SortBy::Downloads => selected.sort_by(|a, b| b.downloads.cmp(&a.downloads)),
            SortBy::TrustScore => selected.sort_by(|a, b| b.trust_score.cmp(&a.trust_score)),
            SortBy::Views => selected.sort_by(|a, b| b.views.cmp(&a.views)),
            SortBy::Recent => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortBy::Size => selected.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
        }

        selected.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDataset;
    use crate::registry::DatasetRegistry;
    use rstest::rstest;

    fn catalog() -> Vec<DatasetRecord> {
        let registry = DatasetRegistry::default();
        let specs = [
            ("0xA", "Climate Grid", "Hourly temperature", "Environment", &["climate", "Weather"][..], 10u64),
            ("0xB", "Genome Panel", "Variant calls", "Genomics", &["genetics"][..], 1_000),
            ("0xA", "Street Sensors", "Air quality readings", "IoT", &["iot", "smart-city"][..], 100),
        ];
        for (creator, name, description, category, tags, size) in specs {
            registry
                .create_dataset(NewDataset {
                    creator: creator.into(),
                    content_id: format!("Qm{}", name.replace(' ', "")),
                    name: name.into(),
                    description: description.into(),
                    category: category.into(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    size_bytes: size,
                    ..Default::default()
                })
                .unwrap();
        }
        let ids: Vec<String> = registry.list_all().unwrap().into_iter().map(|r| r.id).collect();
        for _ in 0..3 {
            registry.record_download(&ids[2]).unwrap();
        }
        registry.record_download(&ids[1]).unwrap();
        registry.list_all().unwrap()
    }

    fn names(datasets: &[DatasetRecord]) -> Vec<&str> {
        datasets.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_default_sorts_by_downloads() {
        let result = DatasetQuery::default().apply(catalog());
        assert_eq!(names(&result), vec!["Street Sensors", "Genome Panel", "Climate Grid"]);
    }

    #[rstest]
    #[case::by_name("climate", vec!["Climate Grid"])]
    #[case::by_description("VARIANT", vec!["Genome Panel"])]
    #[case::by_category("iot", vec!["Street Sensors"])]
    #[case::no_match("astronomy", vec![])]
    fn test_search(#[case] search: &str, #[case] expected: Vec<&str>) {
        let query = DatasetQuery {
            search: Some(search.to_string()),
            ..Default::default()
        };
        let result = query.apply(catalog());
        assert_eq!(names(&result), expected);
    }

    #[test]
    fn test_tag_filter_is_substring_and_case_insensitive() {
        let query = DatasetQuery::default().with_tag_list(" weath , city");
        let result = query.apply(catalog());
        assert_eq!(names(&result), vec!["Street Sensors", "Climate Grid"]);
    }

    #[test]
    fn test_creator_and_size_sort() {
        let query = DatasetQuery {
            creator: Some("0xA".to_string()),
            sort_by: SortBy::parse("size"),
            ..Default::default()
        };
        let result = query.apply(catalog());
        assert_eq!(names(&result), vec!["Street Sensors", "Climate Grid"]);
    }

    #[test]
    fn test_pagination() {
        let query = DatasetQuery {
            limit: 1,
            offset: 1,
            ..Default::default()
        };
        assert_eq!(names(&query.apply(catalog())), vec!["Genome Panel"]);

        let past_end = DatasetQuery {
            offset: 10,
            ..Default::default()
        };
        assert!(past_end.apply(catalog()).is_empty());
    }

    #[test]
    fn test_unknown_sort_key_falls_back() {
        assert_eq!(SortBy::parse("popularity"), SortBy::Downloads);
        assert_eq!(SortBy::parse("trustScore"), SortBy::TrustScore);
    }
}
