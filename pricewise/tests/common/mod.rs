#![allow(dead_code)]

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pricewise::{EntityAttributes, InMemoryHistory, PriceObservation};

pub const ENTITIES: u64 = 3;

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

/// Weekly cycle on a slow drift, one observation per entity per day
pub fn price_on(entity: u64, day: i64) -> f64 {
    let base = 40_000.0 + 15_000.0 * entity as f64;
    let cycle = [0.0, 150.0, 300.0, 200.0, -100.0, -250.0, -50.0][(day % 7) as usize];
    base + cycle - 8.0 * day as f64
}

pub fn attributes(entity: u64) -> EntityAttributes {
    let (brand, processor, graphics) = match entity % 3 {
        0 => ("Dell", "Intel Core i5-1235U", "Intel Iris Xe"),
        1 => ("Lenovo", "AMD Ryzen 7 5800H", "NVIDIA GeForce RTX 3050"),
        _ => ("HP", "Intel Core i7-1255U", "NVIDIA GeForce GTX 1650"),
    };
    EntityAttributes {
        brand: Some(brand.to_string()),
        platform: Some(if entity % 2 == 0 { "Amazon" } else { "Flipkart" }.to_string()),
        processor_spec: Some(processor.to_string()),
        ram_spec: Some(format!("{} GB DDR4", 8 * entity)),
        storage_spec: Some("512 GB SSD".to_string()),
        graphics_spec: Some(graphics.to_string()),
        ..EntityAttributes::bare(entity)
    }
}

pub fn history(entities: u64, days: i64) -> InMemoryHistory {
    let history = InMemoryHistory::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
    for entity in 1..=entities {
        history.upsert_attributes(attributes(entity));
        for day in 0..days {
            history
                .insert_observation(PriceObservation::new(
                    entity,
                    start + Duration::days(day),
                    price_on(entity, day),
                ))
                .unwrap();
        }
    }
    history
}
