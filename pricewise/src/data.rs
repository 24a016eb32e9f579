//! Price observations, entity attributes and the history source boundary

use crate::error::{PricewiseError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Identifier of a tracked product
pub type EntityId = u64;

/// One recorded price of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Entity the price belongs to
    pub entity_id: EntityId,
    /// When the price was recorded
    pub timestamp: DateTime<Utc>,
    /// Listed price, strictly positive
    pub price: f64,
    /// Discounted price, never above `price`
    pub discount_price: Option<f64>,
    /// Whether the entity was purchasable at `timestamp`
    pub in_stock: bool,
}

impl PriceObservation {
    /// Create an in-stock observation without a discount
    pub fn new(entity_id: EntityId, timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            entity_id,
            timestamp,
            price,
            discount_price: None,
            in_stock: true,
        }
    }

    /// Check the price invariants
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PricewiseError::DataError(format!(
                "Price must be positive for entity {}, got {}",
                self.entity_id, self.price
            )));
        }
        if let Some(discount) = self.discount_price {
            if !discount.is_finite() || discount > self.price {
                return Err(PricewiseError::DataError(format!(
                    "Discount price {} exceeds price {} for entity {}",
                    discount, self.price, self.entity_id
                )));
            }
        }
        Ok(())
    }
}

/// Static, free-text description of an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    pub entity_id: EntityId,
    pub brand: Option<String>,
    pub platform: Option<String>,
    pub processor_spec: Option<String>,
    pub ram_spec: Option<String>,
    pub storage_spec: Option<String>,
    pub graphics_spec: Option<String>,
}

impl EntityAttributes {
    /// Attributes with only an id; every spec is absent
    pub fn bare(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            ..Self::default()
        }
    }
}

/// Read access to recorded history, supplied by the storage collaborator
pub trait HistorySource: Send + Sync {
    /// Every observation of every entity
    fn all_observations(&self) -> Vec<PriceObservation>;

    /// Observations of one entity in chronological order
    fn observations(&self, entity_id: EntityId) -> Vec<PriceObservation>;

    /// Attributes of one entity, if known
    fn attributes(&self, entity_id: EntityId) -> Option<EntityAttributes>;

    /// Attributes of every known entity
    fn all_attributes(&self) -> HashMap<EntityId, EntityAttributes>;

    /// Total number of observations
    fn observation_count(&self) -> usize {
        self.all_observations().len()
    }
}

impl<T: HistorySource + ?Sized> HistorySource for Arc<T> {
    fn all_observations(&self) -> Vec<PriceObservation> {
        (**self).all_observations()
    }

    fn observations(&self, entity_id: EntityId) -> Vec<PriceObservation> {
        (**self).observations(entity_id)
    }

    fn attributes(&self, entity_id: EntityId) -> Option<EntityAttributes> {
        (**self).attributes(entity_id)
    }

    fn all_attributes(&self) -> HashMap<EntityId, EntityAttributes> {
        (**self).all_attributes()
    }

    fn observation_count(&self) -> usize {
        (**self).observation_count()
    }
}

#[derive(Debug, Default)]
struct HistoryTables {
    observations: BTreeMap<EntityId, Vec<PriceObservation>>,
    attributes: BTreeMap<EntityId, EntityAttributes>,
}

/// Thread-safe in-memory history, fillable while forecasts are being served
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    tables: RwLock<HistoryTables>,
}

#[derive(Debug, Deserialize)]
struct ObservationRecord {
    entity_id: EntityId,
    timestamp: String,
    price: f64,
    discount_price: Option<f64>,
    in_stock: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AttributesRecord {
    entity_id: EntityId,
    brand: Option<String>,
    platform: Option<String>,
    processor: Option<String>,
    ram: Option<String>,
    storage: Option<String>,
    graphics: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse an RFC 3339 timestamp, a `YYYY-MM-DD HH:MM:SS` timestamp or a bare
/// date (taken as midnight UTC)
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(PricewiseError::DataError(format!(
        "Unrecognized timestamp: {}",
        raw
    )))
}

impl InMemoryHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Load observation and attribute CSV exports.
    ///
    /// Observations need the columns `entity_id,timestamp,price` and may carry
    /// `discount_price,in_stock`. Attributes use
    /// `entity_id,brand,platform,processor,ram,storage,graphics`.
    pub fn from_csv<P: AsRef<Path>>(observations: P, attributes: Option<P>) -> Result<Self> {
        let history = Self::new();

        let mut reader = csv::Reader::from_path(observations.as_ref())?;
        for record in reader.deserialize::<ObservationRecord>() {
            let record = record?;
            history.insert_observation(PriceObservation {
                entity_id: record.entity_id,
                timestamp: parse_timestamp(&record.timestamp)?,
                price: record.price,
                discount_price: record.discount_price,
                in_stock: record.in_stock.unwrap_or(true),
            })?;
        }

        if let Some(path) = attributes {
            let mut reader = csv::Reader::from_path(path.as_ref())?;
            for record in reader.deserialize::<AttributesRecord>() {
                let record = record?;
                history.upsert_attributes(EntityAttributes {
                    entity_id: record.entity_id,
                    brand: non_empty(record.brand),
                    platform: non_empty(record.platform),
                    processor_spec: non_empty(record.processor),
                    ram_spec: non_empty(record.ram),
                    storage_spec: non_empty(record.storage),
                    graphics_spec: non_empty(record.graphics),
                });
            }
        }

        info!(
            observations = history.observation_count(),
            entities = history.entity_count(),
            "Loaded price history from CSV"
        );
        Ok(history)
    }

    /// Record a validated observation, keeping per-entity chronological order
    pub fn insert_observation(&self, observation: PriceObservation) -> Result<()> {
        observation.validate()?;
        let mut tables = self.tables.write();
        let series = tables
            .observations
            .entry(observation.entity_id)
            .or_default();
        let at = series.partition_point(|o| o.timestamp <= observation.timestamp);
        series.insert(at, observation);
        Ok(())
    }

    /// Record many observations, stopping at the first invalid one
    pub fn extend<I>(&self, observations: I) -> Result<()>
    where
        I: IntoIterator<Item = PriceObservation>,
    {
        for observation in observations {
            self.insert_observation(observation)?;
        }
        Ok(())
    }

    /// Insert or replace the attributes of an entity
    pub fn upsert_attributes(&self, attributes: EntityAttributes) {
        debug!(entity_id = attributes.entity_id, "Upserting attributes");
        self.tables
            .write()
            .attributes
            .insert(attributes.entity_id, attributes);
    }

    /// Number of entities with at least one observation
    pub fn entity_count(&self) -> usize {
        self.tables.read().observations.len()
    }
}

impl HistorySource for InMemoryHistory {
    fn all_observations(&self) -> Vec<PriceObservation> {
        self.tables
            .read()
            .observations
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    fn observations(&self, entity_id: EntityId) -> Vec<PriceObservation> {
        self.tables
            .read()
            .observations
            .get(&entity_id)
            .cloned()
            .unwrap_or_default()
    }

    fn attributes(&self, entity_id: EntityId) -> Option<EntityAttributes> {
        self.tables.read().attributes.get(&entity_id).cloned()
    }

    fn all_attributes(&self) -> HashMap<EntityId, EntityAttributes> {
        self.tables
            .read()
            .attributes
            .iter()
            .map(|(id, attrs)| (*id, attrs.clone()))
            .collect()
    }

    fn observation_count(&self) -> usize {
        self.tables.read().observations.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_validate() {
        assert!(PriceObservation::new(1, at(1), 100.0).validate().is_ok());
        assert!(PriceObservation::new(1, at(1), 0.0).validate().is_err());
        assert!(PriceObservation::new(1, at(1), f64::NAN).validate().is_err());

        let mut obs = PriceObservation::new(1, at(1), 100.0);
        obs.discount_price = Some(120.0);
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_insert_keeps_order() {
        let history = InMemoryHistory::new();
        history
            .extend(vec![
                PriceObservation::new(7, at(3), 30.0),
                PriceObservation::new(7, at(1), 10.0),
                PriceObservation::new(7, at(2), 20.0),
            ])
            .unwrap();

        let prices: Vec<f64> = history.observations(7).iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
        assert_eq!(history.observation_count(), 3);
        assert!(history.observations(8).is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2024-01-05").unwrap(), at(5));
        assert_eq!(parse_timestamp("2024-01-05 00:00:00").unwrap(), at(5));
        assert_eq!(parse_timestamp("2024-01-05T00:00:00Z").unwrap(), at(5));
        assert!(parse_timestamp("yesterday").is_err());
    }
}
