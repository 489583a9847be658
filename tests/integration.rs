//! Integration tests for BoxOffice

use boxoffice::pipeline::N_CLUSTERS;
use boxoffice::predict::{SUMMER_TIP, UNKNOWN_CATEGORY};
use boxoffice::{
    run_training, ArtifactError, ClusterScope, MovieInput, Predictor, RequestError,
    TrainingConfig, FEATURE_NAMES,
};
use chrono::NaiveDate;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::{tempdir, NamedTempFile};

const VALID_MOVIES: usize = 40;
const INVALID_MOVIES: usize = 3;

fn number_list(len: usize) -> String {
    let items: Vec<String> = (0..len).map(|i| i.to_string()).collect();
    format!("\"[{}]\"", items.join(", "))
}

/// Create a TMDB-shaped CSV with 40 usable movies and 3 that must be filtered
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "budget,genres,keywords,popularity,production_companies,release_date,revenue,runtime,title,vote_average,vote_count"
    )
    .unwrap();

    for i in 0..VALID_MOVIES {
        let budget = 5_000_000 + i * 3_000_000;
        let revenue = budget * 5 / 2 + i * 1_000_000;
        let release_date = if i == 7 {
            String::new()
        } else {
            format!("{}-{:02}-15", 2000 + i % 20, 1 + i % 12)
        };
        writeln!(
            file,
            "{},{},{},{:.2},{},{},{},{},Movie {},{:.1},{}",
            budget,
            number_list(1 + i % 4),
            number_list(i % 10),
            1.0 + i as f64 * 0.5,
            number_list(1 + i % 3),
            release_date,
            revenue,
            90 + i % 60,
            i,
            5.0 + (i % 5) as f64 * 0.8,
            100 + i * 50
        )
        .unwrap();
    }

    writeln!(file, r#"0,"[1]","[]",2.0,"[1]",2010-05-01,1000000,100,Zero Budget,6.0,50"#).unwrap();
    writeln!(file, r#"1000000,"[1]","[]",2.0,"[1]",2010-05-01,0,100,Zero Revenue,6.0,50"#).unwrap();
    writeln!(file, r#","[1]","[]",2.0,"[1]",2010-05-01,5000000,100,No Budget,6.0,50"#).unwrap();

    file
}

fn train(dataset: &Path, models_dir: &Path, cluster_scope: ClusterScope) -> boxoffice::TrainingReport {
    let config = TrainingConfig {
        dataset: dataset.to_path_buf(),
        models_dir: models_dir.to_path_buf(),
        cluster_scope,
        ..Default::default()
    };
    run_training(&config).unwrap()
}

/// The worked example: a mid-budget summer release
fn summer_movie() -> MovieInput {
    MovieInput {
        budget: 50_000_000.0,
        runtime: 120.0,
        release_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        num_genres: 2,
        production_companies: 3,
        keywords_count: 15,
        // Entered on the 1-100 scale, becomes 5.0 as a feature
        popularity: 50.0,
        vote_average: 7.0,
        vote_count: 1000.0,
    }
}

#[test]
fn test_training_filters_and_persists() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();

    let report = train(csv.path(), models.path(), ClusterScope::Train);

    assert_eq!(report.total_rows, VALID_MOVIES + INVALID_MOVIES);
    assert_eq!(report.kept_rows, VALID_MOVIES);
    assert_eq!(report.test_rows, 8);
    assert_eq!(report.train_rows, 32);
    assert_eq!(report.cluster_sizes.len(), N_CLUSTERS);
    assert_eq!(report.cluster_sizes.iter().sum::<usize>(), report.train_rows);
    assert!(report.train_r2 > 0.5);
    assert!(report.inertia.is_finite());

    for file in [
        "scaler.json",
        "revenue_model.json",
        "clustering_model.json",
        "feature_list.json",
    ] {
        assert!(models.path().join(file).exists(), "missing {}", file);
    }
}

#[test]
fn test_full_cluster_scope_uses_every_row() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();

    let report = train(csv.path(), models.path(), ClusterScope::Full);
    assert_eq!(report.cluster_sizes.iter().sum::<usize>(), VALID_MOVIES);
}

#[test]
fn test_feature_list_matches_canonical_order() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();
    train(csv.path(), models.path(), ClusterScope::Train);

    let predictor = Predictor::load(models.path()).unwrap();
    assert_eq!(predictor.feature_names(), FEATURE_NAMES);

    let report = predictor.predict(&summer_movie()).unwrap();
    let row_names: Vec<&str> = report.feature_row.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(row_names, FEATURE_NAMES);
    assert_eq!(report.feature_row[7].1, 5.0);
}

#[test]
fn test_end_to_end_prediction() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();
    train(csv.path(), models.path(), ClusterScope::Train);

    let predictor = Predictor::load(models.path()).unwrap();
    let input = summer_movie();

    let first = predictor.predict(&input).unwrap();
    assert!(first.predicted_revenue.is_finite());
    assert!(first.predicted_revenue >= 0.0);
    assert!(first.cluster < N_CLUSTERS);
    assert_ne!(first.insight, UNKNOWN_CATEGORY);
    assert_eq!(first.tip, SUMMER_TIP);
    assert_eq!(first.facts.release_month, 6);
    assert_eq!(first.facts.release_year, 2024);
    assert_eq!(first.facts.budget_millions, 50.0);

    let expected_roi = (first.predicted_revenue - input.budget) / input.budget * 100.0;
    assert!((first.roi - expected_roi).abs() < 1e-9);

    // Same loaded model, same answer
    let second = predictor.predict(&input).unwrap();
    assert_eq!(first, second);

    // A fresh load of the same artifacts agrees as well
    let reloaded = Predictor::load(models.path()).unwrap();
    assert_eq!(reloaded.predict(&input).unwrap(), first);
}

#[test]
fn test_retraining_is_deterministic() {
    let csv = create_test_csv();
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    train(csv.path(), first_dir.path(), ClusterScope::Train);
    train(csv.path(), second_dir.path(), ClusterScope::Train);

    let first = Predictor::load(first_dir.path()).unwrap();
    let second = Predictor::load(second_dir.path()).unwrap();
    assert_eq!(
        first.predict(&summer_movie()).unwrap(),
        second.predict(&summer_movie()).unwrap()
    );
}

#[test]
fn test_request_errors_do_not_poison_the_service() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();
    train(csv.path(), models.path(), ClusterScope::Train);
    let predictor = Predictor::load(models.path()).unwrap();

    let mut broken = summer_movie();
    broken.budget = 0.0;
    assert!(matches!(
        predictor.predict(&broken),
        Err(RequestError::InvalidInput(_))
    ));

    let malformed = summer_movie().apply_request("budget=lots");
    assert!(matches!(malformed, Err(RequestError::Malformed(_))));

    // Later requests are unaffected
    let request = summer_movie()
        .apply_request("budget=20000000 release_date=2024-12-20")
        .unwrap();
    let report = predictor.predict(&request).unwrap();
    assert_eq!(report.facts.release_month, 12);
    assert!(report.cluster < N_CLUSTERS);
}

#[test]
fn test_out_of_range_request_is_rejected_then_service_continues() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();
    train(csv.path(), models.path(), ClusterScope::Train);
    let predictor = Predictor::load(models.path()).unwrap();
    let base = summer_movie();

    let line = "budget=1 runtime=5000 vote_average=55 genres=99 popularity=100000";
    let result = base
        .apply_request(line)
        .and_then(|input| predictor.predict(&input));
    assert!(matches!(result, Err(RequestError::InvalidInput(_))));

    // An input built directly is checked by the predictor too
    let mut oversized = summer_movie();
    oversized.runtime = 5000.0;
    assert!(matches!(
        predictor.predict(&oversized),
        Err(RequestError::InvalidInput(_))
    ));

    let report = base
        .apply_request("budget=80000000 release_date=2025-07-04")
        .and_then(|input| predictor.predict(&input))
        .unwrap();
    assert_eq!(report.facts.budget_millions, 80.0);
    assert_eq!(report.tip, SUMMER_TIP);
}

#[test]
fn test_missing_models_are_reported() {
    let models = tempdir().unwrap();
    let err = Predictor::load(models.path()).unwrap_err();
    assert!(matches!(err, ArtifactError::Missing(_)));
}

#[test]
fn test_empty_dataset_aborts_without_artifacts() {
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(
        csv,
        "budget,genres,keywords,popularity,production_companies,release_date,revenue,runtime,title,vote_average,vote_count"
    )
    .unwrap();
    writeln!(csv, r#"0,"[]","[]",1.0,"[]",2015-07-04,0,88,Nothing,4.0,3"#).unwrap();

    let models = tempdir().unwrap();
    let config = TrainingConfig {
        dataset: csv.path().to_path_buf(),
        models_dir: models.path().to_path_buf(),
        ..Default::default()
    };

    assert!(run_training(&config).is_err());
    assert!(Predictor::load(models.path()).is_err());
}

fn run_predict_command(models_dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_boxoffice"))
        .args(["predict", "--release-date", "2024-06-01", "--models-dir"])
        .arg(models_dir)
        .output()
        .unwrap()
}

#[test]
fn test_predict_command_exit_status() {
    let csv = create_test_csv();
    let models = tempdir().unwrap();
    train(csv.path(), models.path(), ClusterScope::Train);

    let ok = run_predict_command(models.path());
    assert!(ok.status.success());
    assert!(String::from_utf8_lossy(&ok.stdout).contains("Predicted Revenue"));

    // Same width, so the artifacts still load, but no input feature maps onto it
    let feature_list = models.path().join("feature_list.json");
    let mut names: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(&feature_list).unwrap()).unwrap();
    names[0] = "budget_usd".to_string();
    std::fs::write(&feature_list, serde_json::to_string(&names).unwrap()).unwrap();
    assert!(Predictor::load(models.path()).is_ok());

    let failed = run_predict_command(models.path());
    assert!(!failed.status.success());
    assert!(!String::from_utf8_lossy(&failed.stdout).contains("Predicted Revenue"));
}

#[test]
fn test_predict_command_without_models_fails() {
    let models = tempdir().unwrap();
    assert!(!run_predict_command(models.path()).status.success());
}
