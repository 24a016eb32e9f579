mod common;

use common::{as_of, history, ENTITIES};
use pretty_assertions::assert_eq;
use pricewise::artifact::ARTIFACT_FORMAT_VERSION;
use pricewise::{ArtifactStore, EngineConfig, PriceEngine, PricewiseError, TrainingOutcome};
use std::fs;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.artifact.path = Some(dir.path().join("models").join("price_predictor.json"));
    config
}

#[test]
fn test_reload_gives_identical_forecasts() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let first = PriceEngine::new(history(ENTITIES, 60), config.clone()).unwrap();
    assert!(matches!(first.train(false), TrainingOutcome::Trained(_)));
    let expected = first.forecast_at(1, 10, as_of()).unwrap();

    // a fresh engine picks the artifact up without training
    let second = PriceEngine::new(history(ENTITIES, 60), config).unwrap();
    assert!(second.is_trained());
    assert_eq!(second.artifact().unwrap().as_ref(), first.artifact().unwrap().as_ref());
    assert_eq!(second.forecast_at(1, 10, as_of()).unwrap(), expected);
}

#[test]
fn test_missing_artifact_is_untrained() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(dir.path().join("absent.json"));
    assert!(store.load().unwrap().is_none());

    let engine = PriceEngine::new(history(1, 10), config_in(&dir)).unwrap();
    assert!(!engine.is_trained());
}

#[test]
fn test_corrupted_artifact_is_untrained() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let path = config.artifact.path.clone().unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"{\"format_version\": 1, \"regressor\": [").unwrap();

    assert!(matches!(
        ArtifactStore::new(path.clone()).load(),
        Err(PricewiseError::Artifact(_))
    ));

    let engine = PriceEngine::new(history(ENTITIES, 60), config).unwrap();
    assert!(!engine.is_trained());

    // the next forecast trains and overwrites the corrupt file
    engine.forecast_at(2, 3, as_of()).unwrap();
    assert!(ArtifactStore::new(path.clone()).load().unwrap().is_some());
}

#[test]
fn test_version_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let engine = PriceEngine::new(history(ENTITIES, 60), config.clone()).unwrap();
    engine.train(false);

    let mut artifact = engine.artifact().unwrap().as_ref().clone();
    artifact.format_version = ARTIFACT_FORMAT_VERSION + 1;
    let store = ArtifactStore::new(config.artifact.path.clone().unwrap());
    store.save(&artifact).unwrap();

    assert!(matches!(store.load(), Err(PricewiseError::Artifact(_))));
    assert!(!PriceEngine::new(history(1, 10), config).unwrap().is_trained());
}

#[test]
fn test_save_leaves_no_temporary_files() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let engine = PriceEngine::new(history(ENTITIES, 60), config.clone()).unwrap();
    engine.train(false);
    engine.train(true);

    let entries: Vec<_> = fs::read_dir(config.artifact.path.unwrap().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("price_predictor.json")]);
}

#[test]
fn test_cyclic_tree_is_treated_as_corrupt() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let path = config.artifact.path.clone().unwrap();
    let engine = PriceEngine::new(history(ENTITIES, 60), config.clone()).unwrap();
    engine.train(false);

    // point the first split of the first tree back at itself
    let mut document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let nodes = document["regressor"]["trees"][0]["nodes"]
        .as_array_mut()
        .unwrap();
    let (slot, split) = nodes
        .iter_mut()
        .enumerate()
        .find(|(_, node)| node["kind"] == "split")
        .unwrap();
    split["left"] = serde_json::json!(slot);
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    assert!(matches!(
        ArtifactStore::new(path.clone()).load(),
        Err(PricewiseError::Artifact(_))
    ));
    assert!(!PriceEngine::new(history(1, 10), config).unwrap().is_trained());
}
