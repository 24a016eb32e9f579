//! The engine context: published artifact, training, forecasts and batches

use crate::artifact::{ArtifactStore, ModelArtifact, RetrainPolicy};
use crate::config::EngineConfig;
use crate::data::{EntityId, HistorySource};
use crate::error::{PricewiseError, Result};
use crate::forecast::{ForecastResult, ForecastSimulator};
use crate::recommendation::BestTimeResult;
use crate::training::{TrainingOutcome, TrainingPipeline};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Forecasting engine over a history source.
///
/// Forecasts read the currently published [`ModelArtifact`] and never mutate
/// it; training builds a replacement off to the side and swaps it in. Training
/// runs are serialized, so overlapping fits never publish twice.
pub struct PriceEngine<S: HistorySource> {
    source: S,
    config: EngineConfig,
    store: Option<ArtifactStore>,
    policy: RetrainPolicy,
    published: RwLock<Option<Arc<ModelArtifact>>>,
    training: Mutex<()>,
}

impl<S: HistorySource> std::fmt::Debug for PriceEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceEngine")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("trained", &self.is_trained())
            .finish()
    }
}

impl<S: HistorySource> PriceEngine<S> {
    /// Build an engine and load any persisted artifact.
    ///
    /// A missing or unreadable artifact leaves the engine untrained; only an
    /// invalid configuration is an error.
    pub fn new(source: S, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let store = config.artifact.path.clone().map(ArtifactStore::new);
        let loaded = match store.as_ref().map(ArtifactStore::load) {
            Some(Ok(artifact)) => artifact,
            Some(Err(err)) => {
                warn!(error = %err, "Ignoring persisted artifact; engine starts untrained");
                None
            }
            None => None,
        };

        Ok(Self {
            source,
            policy: RetrainPolicy::new(config.artifact.max_age_hours),
            config,
            store,
            published: RwLock::new(loaded.map(Arc::new)),
            training: Mutex::new(()),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether an artifact is published
    pub fn is_trained(&self) -> bool {
        self.published.read().is_some()
    }

    /// The currently published artifact
    pub fn artifact(&self) -> Option<Arc<ModelArtifact>> {
        self.published.read().clone()
    }

    /// Fit and publish a new artifact.
    ///
    /// Without `force`, an already published artifact is kept. A failed run,
    /// including a failed save, leaves the previous artifact in place.
    #[instrument(skip(self))]
    pub fn train(&self, force: bool) -> TrainingOutcome {
        let _guard = self.training.lock();
        if !force && self.is_trained() {
            return TrainingOutcome::AlreadyTrained;
        }

        let artifact = match TrainingPipeline::new(&self.config.training).run_guarded(&self.source) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(error = %err, "Training did not produce an artifact");
                return TrainingOutcome::Failed(err);
            }
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.save(&artifact) {
                error!(error = %err, path = %store.path().display(), "Failed to persist artifact");
                return TrainingOutcome::Failed(err);
            }
        }

        let metrics = artifact.metrics.clone();
        *self.published.write() = Some(Arc::new(artifact));
        info!(mae = metrics.mae, r2 = metrics.r2, "Published new model artifact");
        TrainingOutcome::Trained(metrics)
    }

    /// Retrain when untrained or when the artifact has outlived
    /// `max_age_hours`; otherwise report [`TrainingOutcome::AlreadyTrained`]
    pub fn retrain_if_stale(&self, now: DateTime<Utc>) -> TrainingOutcome {
        match self.artifact() {
            Some(artifact) if !self.policy.is_stale(&artifact, now) => {
                TrainingOutcome::AlreadyTrained
            }
            Some(_) => {
                info!("Artifact is stale, retraining");
                self.train(true)
            }
            None => self.train(false),
        }
    }

    fn ensure_artifact(&self) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.artifact() {
            return Ok(artifact);
        }
        match self.train(false) {
            TrainingOutcome::Failed(err) => Err(PricewiseError::ModelNotTrained(err.to_string())),
            _ => self
                .artifact()
                .ok_or_else(|| PricewiseError::ModelNotTrained("No artifact published".to_string())),
        }
    }

    fn forecast_with(
        &self,
        artifact: &ModelArtifact,
        entity_id: EntityId,
        days_ahead: usize,
        as_of: NaiveDate,
    ) -> Result<ForecastResult> {
        let history = self.source.observations(entity_id);
        if history.is_empty() {
            return Err(PricewiseError::NoHistory(entity_id));
        }
        let attributes = self.source.attributes(entity_id);

        ForecastSimulator::new(artifact, &self.config.forecast, self.config.training.seed).simulate(
            entity_id,
            &history,
            attributes.as_ref(),
            days_ahead,
            as_of,
        )
    }

    /// Forecast `days_ahead` days starting tomorrow
    pub fn forecast(&self, entity_id: EntityId, days_ahead: usize) -> Result<ForecastResult> {
        self.forecast_at(entity_id, days_ahead, Utc::now().date_naive())
    }

    /// Forecast `days_ahead` days after `as_of`, training first if needed
    #[instrument(skip(self))]
    pub fn forecast_at(
        &self,
        entity_id: EntityId,
        days_ahead: usize,
        as_of: NaiveDate,
    ) -> Result<ForecastResult> {
        if days_ahead == 0 {
            return Err(PricewiseError::InvalidParameter(
                "days_ahead must be at least 1".to_string(),
            ));
        }
        let artifact = self.ensure_artifact()?;
        self.forecast_with(&artifact, entity_id, days_ahead, as_of)
    }

    /// Cheapest day within the next `horizon_days`
    pub fn best_time_to_buy(&self, entity_id: EntityId, horizon_days: usize) -> Result<BestTimeResult> {
        self.best_time_to_buy_at(entity_id, horizon_days, Utc::now().date_naive())
    }

    /// Cheapest day within `horizon_days` after `as_of`
    pub fn best_time_to_buy_at(
        &self,
        entity_id: EntityId,
        horizon_days: usize,
        as_of: NaiveDate,
    ) -> Result<BestTimeResult> {
        let forecast = self.forecast_at(entity_id, horizon_days, as_of)?;
        BestTimeResult::from_forecast(&forecast)
            .ok_or_else(|| PricewiseError::InvalidParameter("Forecast has no points".to_string()))
    }

    /// Forecast many entities starting tomorrow
    pub fn batch_forecast(
        &self,
        entity_ids: &[EntityId],
        days_ahead: usize,
    ) -> BTreeMap<EntityId, Result<ForecastResult>> {
        self.batch_forecast_at(entity_ids, days_ahead, Utc::now().date_naive())
    }

    /// Forecast many entities in parallel. Each entity succeeds or fails on
    /// its own; duplicate ids collapse to one entry.
    #[instrument(skip(self, entity_ids), fields(entities = entity_ids.len()))]
    pub fn batch_forecast_at(
        &self,
        entity_ids: &[EntityId],
        days_ahead: usize,
        as_of: NaiveDate,
    ) -> BTreeMap<EntityId, Result<ForecastResult>> {
        let unique: BTreeSet<EntityId> = entity_ids.iter().copied().collect();

        if days_ahead == 0 {
            return unique
                .into_iter()
                .map(|entity_id| {
                    let err = PricewiseError::InvalidParameter(
                        "days_ahead must be at least 1".to_string(),
                    );
                    (entity_id, Err(err))
                })
                .collect();
        }

        // one training attempt for the whole batch
        let artifact = self.ensure_artifact().map_err(|err| err.to_string());

        let results: BTreeMap<EntityId, Result<ForecastResult>> = unique
            .into_par_iter()
            .map(|entity_id| {
                let result = match &artifact {
                    Ok(artifact) => self.forecast_with(artifact, entity_id, days_ahead, as_of),
                    Err(message) => Err(PricewiseError::ModelNotTrained(message.clone())),
                };
                (entity_id, result)
            })
            .collect();

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(succeeded = results.len() - failed, failed, "Batch forecast finished");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryHistory, PriceObservation};
    use chrono::{Duration, TimeZone};

    fn seeded_history(entities: u64, days: i64) -> InMemoryHistory {
        let history = InMemoryHistory::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        for entity in 1..=entities {
            for day in 0..days {
                let price = 500.0 * entity as f64 + (day % 7) as f64 * 3.0;
                history
                    .insert_observation(PriceObservation::new(
                        entity,
                        start + Duration::days(day),
                        price,
                    ))
                    .unwrap();
            }
        }
        history
    }

    #[test]
    fn test_untrained_engine_trains_on_first_forecast() {
        let engine = PriceEngine::new(seeded_history(2, 60), EngineConfig::in_memory()).unwrap();
        assert!(!engine.is_trained());

        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let result = engine.forecast_at(1, 7, as_of).unwrap();
        assert!(engine.is_trained());
        assert_eq!(result.predictions.len(), 7);

        assert!(matches!(engine.train(false), TrainingOutcome::AlreadyTrained));
    }

    #[test]
    fn test_insufficient_history_is_model_not_trained() {
        let engine = PriceEngine::new(seeded_history(1, 20), EngineConfig::in_memory()).unwrap();
        let err = engine.forecast(1, 3).unwrap_err();
        assert!(matches!(err, PricewiseError::ModelNotTrained(_)));
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_zero_days_rejected_before_training() {
        let engine = PriceEngine::new(seeded_history(1, 20), EngineConfig::in_memory()).unwrap();
        assert!(matches!(
            engine.forecast(1, 0),
            Err(PricewiseError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_batch_zero_days_skips_training() {
        let engine = PriceEngine::new(seeded_history(2, 60), EngineConfig::in_memory()).unwrap();
        let results = engine.batch_forecast(&[2, 1, 2], 0);

        assert_eq!(results.len(), 2);
        assert!(results
            .values()
            .all(|r| matches!(r, Err(PricewiseError::InvalidParameter(_)))));
        assert!(!engine.is_trained());
    }

    #[test]
    fn test_retrain_if_stale() {
        let mut config = EngineConfig::in_memory();
        config.artifact.max_age_hours = Some(24);
        let engine = PriceEngine::new(seeded_history(2, 60), config).unwrap();

        assert!(matches!(engine.retrain_if_stale(Utc::now()), TrainingOutcome::Trained(_)));
        assert!(matches!(
            engine.retrain_if_stale(Utc::now()),
            TrainingOutcome::AlreadyTrained
        ));
        let later = Utc::now() + Duration::hours(25);
        assert!(matches!(engine.retrain_if_stale(later), TrainingOutcome::Trained(_)));
    }
}
