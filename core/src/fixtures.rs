//! Demo catalogue
//!
//! A fixed set of datasets used to populate development registries and the
//! fixture data source. Counters always start at zero.

use crate::models::{AccessStatus, NewDataset};

const GIB: u64 = 1024 * 1024 * 1024;

struct Fixture {
    creator: &'static str,
    content_id: &'static str,
    name: &'static str,
    description: &'static str,
    license: &'static str,
    category: &'static str,
    tags: &'static [&'static str],
    status: AccessStatus,
    price: u64,
    size_bytes: u64,
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        creator: "0x1234567890abcdef1234567890abcdef12345678",
        content_id: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
        name: "COVID-19 Research Dataset",
        description: "Comprehensive COVID-19 research data with patient demographics and treatment outcomes",
        license: "CC BY 4.0",
        category: "Healthcare",
        tags: &["covid-19", "healthcare", "research", "medical"],
        status: AccessStatus::Public,
        price: 0,
        size_bytes: 2_415_919_104,
    },
    Fixture {
        creator: "0x2345678901bcdef12345678901bcdef123456789",
        content_id: "QmPreviousHashExample123456789abcdef",
        name: "Climate Change Satellite Data",
        description: "Satellite imagery and climate measurements from 2020-2024 for environmental research",
        license: "Open Data Commons",
        category: "Environment",
        tags: &["climate", "satellite", "environment", "research"],
        status: AccessStatus::Public,
        price: 0,
        size_bytes: 16_859_832_320,
    },
    Fixture {
        creator: "0x3456789012cdef123456789012cdef1234567890",
        content_id: "QmFinancialDataExample987654321fedcba",
        name: "Financial Market Analysis",
        description: "Stock market data and trading patterns for machine learning training",
        license: "Commercial",
        category: "Finance",
        tags: &["finance", "trading", "machine-learning", "stocks"],
        status: AccessStatus::Gated,
        price: 50,
        size_bytes: 5_476_515_840,
    },
    Fixture {
        creator: "0x4567890123def1234567890123def12345678901",
        content_id: "QmGenomicsDataExample456789012345abcd",
        name: "Human Genome Variants",
        description: "Anonymized human genome variant data for genetic research and drug discovery",
        license: "Research Only",
        category: "Genomics",
        tags: &["genomics", "genetics", "research", "healthcare"],
        status: AccessStatus::Private,
        price: 0,
        size_bytes: 12 * GIB,
    },
    Fixture {
        creator: "0x5678901234ef12345678901234ef123456789012",
        content_id: "QmAITrainingDataExample789012345678efgh",
        name: "Computer Vision Training Set",
        description: "Large-scale image dataset with annotations for computer vision model training",
        license: "MIT",
        category: "AI/ML",
        tags: &["computer-vision", "ai", "machine-learning", "images"],
        status: AccessStatus::Public,
        price: 0,
        size_bytes: 50 * GIB,
    },
    Fixture {
        creator: "0x6789012345f123456789012345f1234567890123",
        content_id: "QmIoTSensorDataExample901234567890ijkl",
        name: "Smart City IoT Sensor Data",
        description: "Sensor data from smart city infrastructure including traffic, air quality, and energy usage",
        license: "CC BY-SA 4.0",
        category: "IoT",
        tags: &["iot", "smart-city", "sensors", "urban-planning"],
        status: AccessStatus::Public,
        price: 0,
        size_bytes: 8 * GIB,
    },
    Fixture {
        creator: "0x7890123456f1234567890123456f12345678901234",
        content_id: "QmSocialMediaDataExample012345678901mnop",
        name: "Social Media Sentiment Analysis",
        description: "Anonymized social media posts with sentiment labels for NLP research",
        license: "Academic Use Only",
        category: "NLP",
        tags: &["nlp", "sentiment-analysis", "social-media", "text-mining"],
        status: AccessStatus::Gated,
        price: 25,
        size_bytes: 3 * GIB,
    },
    Fixture {
        creator: "0x9012345678f123456789012345678f1234567890",
        content_id: "QmEducationDataExample234567890123uvwx",
        name: "Educational Performance Dataset",
        description: "Anonymized student performance data for educational research and policy analysis",
        license: "Educational Use",
        category: "Education",
        tags: &["education", "student-performance", "research", "policy"],
        status: AccessStatus::Private,
        price: 0,
        size_bytes: GIB,
    },
];

/// The demo catalogue as registration fields
pub fn demo_datasets() -> Vec<NewDataset> {
    FIXTURES
        .iter()
        .map(|f| NewDataset {
            creator: f.creator.to_string(),
            content_id: f.content_id.to_string(),
            integrity_hash: String::new(),
            name: f.name.to_string(),
            file_name: String::new(),
            description: f.description.to_string(),
            license: f.license.to_string(),
            category: f.category.to_string(),
            tags: f.tags.iter().map(|t| t.to_string()).collect(),
            access_status: f.status,
            price: f.price,
            size_bytes: f.size_bytes,
            encryption: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DatasetRegistry;

    #[test]
    fn test_fixtures_register_cleanly() {
        let registry = DatasetRegistry::default();
        let records = registry.seed(demo_datasets()).unwrap();

        assert_eq!(records.len(), FIXTURES.len());
        assert!(records.iter().all(|r| r.downloads == 0 && r.views == 0));

        let gated: Vec<_> = records
            .iter()
            .filter(|r| r.access_status == AccessStatus::Gated)
            .collect();
        assert_eq!(gated.len(), 2);
        assert!(gated.iter().all(|r| r.price > 0 && registry.access_grant(&r.id).unwrap().is_some()));
    }
}
