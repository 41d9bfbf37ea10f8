//! Sample listings loaded into an empty store for local runs and demos.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use super::domain::ListingDraft;
use super::form::{FormSchema, PublishForm, ValidationErrors};
use super::repository::{ListingRepository, RepositoryError};
use super::store::DocumentStore;
use crate::auth::UserId;

const EMBEDDED_SAMPLES: &str = include_str!("../../data/sample_listings.csv");

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read sample listings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid sample listing CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: invalid created_on date `{value}`")]
    InvalidDate { row: usize, value: String },
    #[error("row {row}: {errors}")]
    InvalidRow {
        row: usize,
        #[source]
        errors: ValidationErrors,
    },
    #[error("could not store sample listing: {0}")]
    Repository(#[from] RepositoryError),
}

/// A validated sample row ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleListing {
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub draft: ListingDraft,
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    owner_id: String,
    created_on: String,
    name: String,
    #[serde(default)]
    company: Option<String>,
    city: String,
    #[serde(default)]
    neighborhood: Option<String>,
    phone: String,
    #[serde(default)]
    email: Option<String>,
    categories: String,
    description: String,
    #[serde(default)]
    contact_message: Option<String>,
}

impl SampleRow {
    fn into_sample(self, row: usize) -> Result<SampleListing, SeedError> {
        let created_at = parse_date(&self.created_on).ok_or_else(|| SeedError::InvalidDate {
            row,
            value: self.created_on.clone(),
        })?;

        let form = PublishForm {
            name: self.name,
            company: self.company,
            city: self.city,
            neighborhood: self.neighborhood,
            phone: self.phone,
            email: self.email,
            categories: self.categories.split('|').map(str::to_string).collect(),
            description: self.description,
            contact_message: self.contact_message,
            custom_category: None,
        };
        let draft = form
            .validate()
            .map_err(|errors| SeedError::InvalidRow { row, errors })?;

        Ok(SampleListing {
            owner_id: UserId(self.owner_id),
            created_at,
            draft,
        })
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .map(|moment| moment.and_utc())
}

pub struct SampleListings;

impl SampleListings {
    /// The sample set compiled into the crate.
    pub fn embedded() -> Result<Vec<SampleListing>, SeedError> {
        Self::from_reader(EMBEDDED_SAMPLES.as_bytes())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SampleListing>, SeedError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Every row must pass the publish form rules; the first bad row aborts the load.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<SampleListing>, SeedError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut samples = Vec::new();
        for (index, record) in csv_reader.deserialize::<SampleRow>().enumerate() {
            let row = index + 1;
            samples.push(record?.into_sample(row)?);
        }
        Ok(samples)
    }
}

/// Persist every sample through the repository and return how many were stored.
pub async fn load_into<S>(
    repository: &ListingRepository<S>,
    samples: Vec<SampleListing>,
) -> Result<usize, SeedError>
where
    S: DocumentStore + 'static,
{
    let mut stored = 0;
    for sample in samples {
        repository
            .create_at(sample.draft, &sample.owner_id, sample.created_at)
            .await?;
        stored += 1;
    }
    info!(stored, "sample listings loaded");
    Ok(stored)
}
