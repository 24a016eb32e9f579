mod common;

use common::{history, ENTITIES};
use pricewise::training::TrainingPipeline;
use pricewise::{PricewiseError, TrainingConfig};
use rstest::rstest;

#[test]
fn test_training_produces_metrics() {
    let config = TrainingConfig::default();
    let artifact = TrainingPipeline::new(&config).run(&history(ENTITIES, 70)).unwrap();

    let metrics = &artifact.metrics;
    assert!(metrics.mae >= 0.0);
    assert!(metrics.mape >= 0.0);
    assert!(metrics.r2.is_finite());
    // 210 rows, 20% held out from the tail
    assert_eq!(metrics.test_samples, 42);
    assert_eq!(metrics.training_samples, 168);
    assert_eq!(artifact.regressor.n_trees(), 50);
    assert!(artifact.check_compatible().is_ok());
}

#[rstest]
#[case(40)]
#[case(99)]
fn test_too_few_observations(#[case] days: i64) {
    let config = TrainingConfig::default();
    let err = TrainingPipeline::new(&config)
        .run(&history(1, days))
        .unwrap_err();

    match err {
        PricewiseError::InsufficientData { observed, required } => {
            assert_eq!(observed, days as usize);
            assert_eq!(required, 100);
        }
        other => panic!("Expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_clean_row_threshold() {
    let config = TrainingConfig {
        min_raw_observations: 10,
        min_clean_rows: 60,
        ..TrainingConfig::default()
    };
    let err = TrainingPipeline::new(&config).run(&history(1, 30)).unwrap_err();
    assert!(matches!(
        err,
        PricewiseError::InsufficientData {
            observed: 30,
            required: 60
        }
    ));
}

#[test]
fn test_encoders_fitted_with_unknown() {
    let config = TrainingConfig::default();
    let artifact = TrainingPipeline::new(&config).run(&history(ENTITIES, 40)).unwrap();

    let brand = artifact
        .encoders
        .encoder(pricewise::encoding::CategoricalField::Brand)
        .unwrap();
    assert!(brand.classes().iter().any(|c| c == pricewise::encoding::UNKNOWN));
    assert!(brand.lookup("Lenovo").is_some());
}

#[test]
fn test_guarded_run_reports_errors() {
    let config = TrainingConfig::default();
    let result = TrainingPipeline::new(&config).run_guarded(&history(1, 5));
    assert!(matches!(result, Err(PricewiseError::InsufficientData { .. })));
}
