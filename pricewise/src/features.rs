//! Feature construction from observations and entity attributes
//!
//! Every model input is a [`FeatureVector`], a fixed-shape record whose column
//! order is [`FEATURE_NAMES`]. Lag and rolling columns are computed per
//! entity over chronologically sorted history.

use crate::data::{EntityAttributes, EntityId, PriceObservation};
use crate::encoding::{CategoricalField, EncoderRegistry};
use crate::error::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use price_math::rolling::RollingWindow;
use regex::Regex;
use std::collections::HashMap;

/// Number of model input columns
pub const FEATURE_COUNT: usize = 22;

/// Trailing window for `price_ma_7` / `price_std_7`
pub const ROLLING_WINDOW: usize = 7;

/// RAM assumed when the spec is missing or has no number
pub const DEFAULT_RAM_GB: f64 = 8.0;

/// Storage assumed when the spec is missing or has no number
pub const DEFAULT_STORAGE_GB: f64 = 512.0;

/// Column names, in [`FeatureVector::to_array`] order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "year",
    "month",
    "day",
    "day_of_week",
    "day_of_year",
    "week_of_year",
    "is_weekend",
    "is_festive_season",
    "is_spring_festival",
    "is_independence_sale",
    "is_year_end_sale",
    "brand_code",
    "platform_code",
    "ram_gb",
    "storage_gb",
    "is_ssd",
    "is_intel",
    "is_amd",
    "has_dedicated_gpu",
    "price_lag_1",
    "price_ma_7",
    "price_std_7",
];

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid number regex"));
static SSD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ssd").expect("valid ssd regex"));
static INTEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)intel|i3|i5|i7|i9").expect("valid intel regex"));
static AMD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)amd|ryzen").expect("valid amd regex"));
static DEDICATED_GPU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)nvidia|geforce|rtx|gtx|radeon rx|arc a").expect("valid gpu regex")
});

/// One model input row
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector {
    pub year: f64,
    pub month: f64,
    pub day: f64,
    pub day_of_week: f64,
    pub day_of_year: f64,
    pub week_of_year: f64,
    pub is_weekend: f64,
    pub is_festive_season: f64,
    pub is_spring_festival: f64,
    pub is_independence_sale: f64,
    pub is_year_end_sale: f64,
    pub brand_code: f64,
    pub platform_code: f64,
    pub ram_gb: f64,
    pub storage_gb: f64,
    pub is_ssd: f64,
    pub is_intel: f64,
    pub is_amd: f64,
    pub has_dedicated_gpu: f64,
    pub price_lag_1: f64,
    pub price_ma_7: f64,
    pub price_std_7: f64,
}

impl FeatureVector {
    /// Columns in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.year,
            self.month,
            self.day,
            self.day_of_week,
            self.day_of_year,
            self.week_of_year,
            self.is_weekend,
            self.is_festive_season,
            self.is_spring_festival,
            self.is_independence_sale,
            self.is_year_end_sale,
            self.brand_code,
            self.platform_code,
            self.ram_gb,
            self.storage_gb,
            self.is_ssd,
            self.is_intel,
            self.is_amd,
            self.has_dedicated_gpu,
            self.price_lag_1,
            self.price_ma_7,
            self.price_std_7,
        ]
    }

    /// Columns as an owned row
    pub fn to_vec(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// Whether every column is finite
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    fn fill_missing(mut self) -> Self {
        for value in [
            &mut self.ram_gb,
            &mut self.storage_gb,
            &mut self.price_lag_1,
            &mut self.price_ma_7,
            &mut self.price_std_7,
        ] {
            if value.is_nan() {
                *value = 0.0;
            }
        }
        self
    }
}

/// A feature row together with the observation it came from
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub entity_id: EntityId,
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
    /// Observed price, the regression target
    pub target: f64,
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// First run of digits in a spec string, e.g. `"16 GB DDR5"` → 16
pub fn parse_first_number(spec: Option<&str>) -> Option<f64> {
    FIRST_NUMBER
        .find(spec?)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[derive(Debug, Clone, Copy)]
struct SpecFeatures {
    ram_gb: f64,
    storage_gb: f64,
    is_ssd: f64,
    is_intel: f64,
    is_amd: f64,
    has_dedicated_gpu: f64,
}

impl SpecFeatures {
    fn parse(attributes: Option<&EntityAttributes>) -> Self {
        let processor = attributes.and_then(|a| a.processor_spec.as_deref());
        let ram = attributes.and_then(|a| a.ram_spec.as_deref());
        let storage = attributes.and_then(|a| a.storage_spec.as_deref());
        let graphics = attributes.and_then(|a| a.graphics_spec.as_deref());

        Self {
            ram_gb: parse_first_number(ram).unwrap_or(DEFAULT_RAM_GB),
            storage_gb: parse_first_number(storage).unwrap_or(DEFAULT_STORAGE_GB),
            // unknown storage is assumed to be solid state
            is_ssd: flag(storage.map_or(true, |s| SSD.is_match(s))),
            is_intel: flag(processor.map_or(false, |s| INTEL.is_match(s))),
            is_amd: flag(processor.map_or(false, |s| AMD.is_match(s))),
            has_dedicated_gpu: flag(graphics.map_or(false, |s| DEDICATED_GPU.is_match(s))),
        }
    }
}

fn base_vector(date: NaiveDate, spec: SpecFeatures, brand: u32, platform: u32) -> FeatureVector {
    let month = date.month();
    let day = date.day();
    let weekday = date.weekday();

    FeatureVector {
        year: date.year() as f64,
        month: month as f64,
        day: day as f64,
        day_of_week: weekday.num_days_from_monday() as f64,
        day_of_year: date.ordinal() as f64,
        week_of_year: date.iso_week().week() as f64,
        is_weekend: flag(matches!(weekday, Weekday::Sat | Weekday::Sun)),
        is_festive_season: flag(month == 10 || month == 11),
        is_spring_festival: flag(month == 3),
        is_independence_sale: flag(month == 8 && (10..=20).contains(&day)),
        is_year_end_sale: flag(month == 12),
        brand_code: brand as f64,
        platform_code: platform as f64,
        ram_gb: spec.ram_gb,
        storage_gb: spec.storage_gb,
        is_ssd: spec.is_ssd,
        is_intel: spec.is_intel,
        is_amd: spec.is_amd,
        has_dedicated_gpu: spec.has_dedicated_gpu,
        price_lag_1: 0.0,
        price_ma_7: 0.0,
        price_std_7: 0.0,
    }
}

/// Build one feature row per observation.
///
/// Rows come back in chronological order (stable for equal timestamps). The
/// first use of a categorical field fits its encoder; later uses reuse it.
pub fn build_features(
    observations: &[PriceObservation],
    attributes: &HashMap<EntityId, EntityAttributes>,
    encoders: &mut EncoderRegistry,
) -> Result<Vec<FeatureRow>> {
    let empty_window = RollingWindow::new(ROLLING_WINDOW)?;
    let mut sorted: Vec<&PriceObservation> = observations.iter().collect();
    sorted.sort_by_key(|o| o.timestamp);

    let attrs_of = |id: EntityId| attributes.get(&id);
    let brands: Vec<Option<&str>> = sorted
        .iter()
        .map(|o| attrs_of(o.entity_id).and_then(|a| a.brand.as_deref()))
        .collect();
    let platforms: Vec<Option<&str>> = sorted
        .iter()
        .map(|o| attrs_of(o.entity_id).and_then(|a| a.platform.as_deref()))
        .collect();
    let brand_codes = encoders.encode(CategoricalField::Brand, &brands);
    let platform_codes = encoders.encode(CategoricalField::Platform, &platforms);

    let mut specs: HashMap<EntityId, SpecFeatures> = HashMap::new();
    let mut trailing: HashMap<EntityId, (f64, RollingWindow)> = HashMap::new();
    let mut rows = Vec::with_capacity(sorted.len());

    for (i, obs) in sorted.iter().enumerate() {
        let spec = *specs
            .entry(obs.entity_id)
            .or_insert_with(|| SpecFeatures::parse(attrs_of(obs.entity_id)));

        // cold start: the lag is the row's own price
        let (lag, window) = trailing
            .entry(obs.entity_id)
            .or_insert_with(|| (obs.price, empty_window.clone()));
        let price_lag_1 = *lag;
        window.update(obs.price);
        *lag = obs.price;

        let mut features = base_vector(
            obs.timestamp.date_naive(),
            spec,
            brand_codes[i],
            platform_codes[i],
        );
        features.price_lag_1 = price_lag_1;
        features.price_ma_7 = window.mean().unwrap_or(f64::NAN);
        features.price_std_7 = window.sample_std().unwrap_or(0.0);

        rows.push(FeatureRow {
            entity_id: obs.entity_id,
            timestamp: obs.timestamp,
            features: features.fill_missing(),
            target: obs.price,
        });
    }

    Ok(rows)
}

/// Build the hypothetical row for a future `date` at `price`, against a frozen
/// encoder registry. With no history of its own the row's lag and mean equal
/// `price` and its volatility is zero.
pub fn build_point(
    date: NaiveDate,
    price: f64,
    attributes: Option<&EntityAttributes>,
    encoders: &EncoderRegistry,
) -> FeatureVector {
    let brand = encoders.transform(
        CategoricalField::Brand,
        attributes.and_then(|a| a.brand.as_deref()),
    );
    let platform = encoders.transform(
        CategoricalField::Platform,
        attributes.and_then(|a| a.platform.as_deref()),
    );

    let mut features = base_vector(date, SpecFeatures::parse(attributes), brand, platform);
    features.price_lag_1 = price;
    features.price_ma_7 = price;
    features.price_std_7 = 0.0;
    features.fill_missing()
}
