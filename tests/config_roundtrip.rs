//! Pipeline document loading, validation and round-trips

use std::path::PathBuf;

use aproximar::approx::ApproximationRegistry;
use aproximar::config::{
    load_config, parse_config, save_config, to_json, ConfigFormat, ValidationError,
};
use aproximar::Error;
use tempfile::TempDir;

fn sample() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs/vanilla_transformer_pipeline.json")
}

#[test]
fn test_json_round_trip_is_lossless() {
    let registry = ApproximationRegistry::with_builtins();
    let config = load_config(sample(), &registry).expect("sample config should load");

    let json = to_json(&config).expect("serialize");
    let back = parse_config(&json, ConfigFormat::Json, &registry).expect("reparse");

    assert_eq!(back, config);
    assert_eq!(to_json(&back).expect("serialize"), json);
}

#[test]
fn test_yaml_save_and_load() {
    let registry = ApproximationRegistry::with_builtins();
    let config = load_config(sample(), &registry).expect("sample config should load");
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("pipeline.yaml");

    save_config(&config, &path).expect("save yaml");
    let back = load_config(&path, &registry).expect("load yaml");

    assert_eq!(back, config);
}

#[test]
fn test_sample_policies() {
    let registry = ApproximationRegistry::with_builtins();
    let config = load_config(sample(), &registry).expect("sample config should load");

    let stage2 = &config.stages()[1].training_policy;
    let es = stage2.early_stopping.as_ref().expect("early stopping enabled");
    assert_eq!(es.patience, 5);
    assert_eq!(stage2.check_val_every_n_epoch, 5);
    assert!(config.stages()[2].training_policy.skip_validation);
    assert_eq!(config.position_of(3), Some(2));
}

#[test]
fn test_missing_training_args_rejected() {
    let registry = ApproximationRegistry::with_builtins();
    let err = parse_config(
        r#"{"pipeline_steps": [{"index": 1, "to_approximate": []}]}"#,
        ConfigFormat::Json,
        &registry,
    )
    .expect_err("training_args is required");
    assert!(matches!(err, Error::ConfigParse(_)));
    assert!(err.is_user_error());
}

#[test]
fn test_unrecognized_module_rejected() {
    let registry = ApproximationRegistry::with_builtins();
    let err = parse_config(
        r#"{"pipeline_steps": [{
            "index": 1,
            "to_approximate": [{"module": "layer_norm", "approximation_type": "rms"}],
            "training_args": {"max_epochs": 1}
        }]}"#,
        ConfigFormat::Json,
        &registry,
    )
    .expect_err("layer_norm is not registered");
    assert!(matches!(
        err,
        Error::ConfigValidation(ValidationError::UnrecognizedModule { stage: 1, .. })
    ));
    assert_eq!(err.code(), "E003");
}

#[test]
fn test_invalid_parameter_carries_stage() {
    let registry = ApproximationRegistry::with_builtins();
    let err = parse_config(
        r#"{"pipeline_steps": [
            {"index": 7, "training_args": {"max_epochs": 1}},
            {"index": 8,
             "to_approximate": [{"module": "softmax", "approximation_type": "polynomial",
                                 "parameters": {"order": 0}}],
             "training_args": {"max_epochs": 1}}
        ]}"#,
        ConfigFormat::Json,
        &registry,
    )
    .expect_err("order must be positive");
    assert!(matches!(
        err,
        Error::InStage {
            stage_index: 8,
            position: 1,
            ..
        }
    ));
    assert!(matches!(err.root(), Error::InvalidParameter { .. }));
}
