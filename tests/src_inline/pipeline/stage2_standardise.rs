use std::fs;
use std::path::Path;

use ndarray::array;

use super::*;
use crate::config::StandardiseMode;
use crate::rootio::fixture::make_temp_dir;

fn config(dir: &Path, standardise: StandardiseMode) -> RunConfig {
    RunConfig {
        input: dir.join("input.root"),
        output: dir.join("ResTopDNN.root"),
        model_dir: dir.to_path_buf(),
        sig_tree: "treeS".to_string(),
        bkg_tree: "treeB".to_string(),
        entries: None,
        standardise,
        verbose: false,
        model_file: "weights.json".to_string(),
        scaler_file: "scaler.json".to_string(),
    }
}

fn samples() -> Samples {
    Samples {
        signal: array![[1.0f32, 2.0], [3.0, 4.0]],
        background: array![[0.1f32, f32::MAX], [-0.0, 1e-30]],
        n_events: 2,
    }
}

#[test]
fn test_none_is_bitwise_passthrough() {
    let dir = make_temp_dir();
    let mut s = samples();
    let before = s.clone();
    run_stage2(&mut s, &config(&dir, StandardiseMode::None)).unwrap();
    let bits = |a: &ndarray::Array2<f32>| a.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&s.signal), bits(&before.signal));
    assert_eq!(bits(&s.background), bits(&before.background));
}

#[test]
fn test_missing_scaler_aborts() {
    let dir = make_temp_dir();
    let mut s = samples();
    let err = run_stage2(&mut s, &config(&dir, StandardiseMode::Robust)).unwrap_err();
    assert!(matches!(err, ModelError::MissingFile(path) if path.ends_with("scaler.json")));
}

#[test]
fn test_scaler_applies_to_both_classes() {
    let dir = make_temp_dir();
    fs::write(
        dir.join("scaler.json"),
        r#"{"kind": "standard", "mean": [1.0, 2.0], "scale": [2.0, 2.0]}"#,
    )
    .unwrap();
    let mut s = Samples {
        signal: array![[3.0f32, 4.0]],
        background: array![[1.0f32, 0.0]],
        n_events: 1,
    };
    run_stage2(&mut s, &config(&dir, StandardiseMode::Standard)).unwrap();
    assert_eq!(s.signal, array![[1.0f32, 1.0]]);
    assert_eq!(s.background, array![[0.0f32, -1.0]]);
}

#[test]
fn test_stored_scaler_kind_wins_over_requested_mode() {
    let dir = make_temp_dir();
    fs::write(dir.join("scaler.json"), r#"{"kind": "max_abs", "scale": [2.0, 4.0]}"#).unwrap();
    let mut s = samples();
    run_stage2(&mut s, &config(&dir, StandardiseMode::Robust)).unwrap();
    assert_eq!(s.signal, array![[0.5f32, 0.5], [1.5, 1.0]]);
}
