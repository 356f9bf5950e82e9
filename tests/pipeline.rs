//! End-to-end tests over review files on disk

use review_stacking::data::{write_predictions, write_product_table, FeatureTable};
use review_stacking::features::ProductAggregator;
use review_stacking::models::{ModelPreset, ModelSpec};
use review_stacking::pipeline::{PipelineArtifacts, StackingPipeline};
use review_stacking::utils::Config;
use std::fmt::Write as _;
use std::path::Path;
use tempfile::tempdir;

const POSITIVE: [(&str, &str); 3] = [
    ("Delicious and fresh, my favorite tea", "Excellent"),
    ("Great flavor, we love these snacks", "Love it"),
    ("Perfect coffee, smooth and rich", "Wonderful"),
];

const NEGATIVE: [(&str, &str); 3] = [
    ("Stale and bitter, awful aftertaste", "Terrible"),
    ("Arrived broken and tasted bad", "Disappointed"),
    ("Horrible smell, would not buy again", "Awful"),
];

/// Newline-delimited reviews: even products rate 5, odd products rate 2
fn write_reviews(path: &Path, n_products: usize, with_nulls: bool) {
    let mut out = String::new();
    for p in 0..n_products {
        let good = p % 2 == 0;
        let texts = if good { POSITIVE } else { NEGATIVE };
        let rating = if good { 5 } else { 2 };
        for (r, (text, summary)) in texts.iter().enumerate() {
            let text = if with_nulls && r == 1 {
                "null".to_string()
            } else {
                format!("\"{}\"", text)
            };
            writeln!(
                out,
                r#"{{"asin":"B{:03}","reviewText":{},"summary":"{}","overall":{},"verified":{}}}"#,
                p,
                text,
                summary,
                rating,
                r != 2
            )
            .unwrap();
        }
        out.push('\n');
    }
    std::fs::write(path, out).unwrap();
}

fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.data.output_dir = output_dir.to_path_buf();
    config.stage_one.models = vec![
        ModelSpec::new("nb_bodies", ModelPreset::NaiveBayes),
        ModelSpec::new("nb_summaries", ModelPreset::NaiveBayes),
        ModelSpec::new("dt_summaries", ModelPreset::DecisionTree),
    ];
    config.evaluation.folds = 4;
    config
}

#[test]
fn test_process_writes_product_table() {
    let dir = tempdir().unwrap();
    let reviews = dir.path().join("reviews.json");
    write_reviews(&reviews, 4, true);

    let pipeline = StackingPipeline::new(test_config(dir.path()));
    let rows = pipeline.process(&reviews, &ProductAggregator::training()).unwrap();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].product_id, "B000");
    assert_eq!(rows[0].review_count, 3);
    assert!((rows[0].verified_ratio - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(rows[0].label, Some(1));
    assert_eq!(rows[1].label, Some(0));
    assert!(rows[0].reviews.contains(" None "));

    let table = dir.path().join("products.csv");
    write_product_table(&table, &rows, true).unwrap();
    let mut reader = csv::Reader::from_path(&table).unwrap();
    let header = reader.headers().unwrap().clone();
    assert_eq!(&header[3], "Awesome?");
    assert_eq!(header.len(), 6 + 24);
    assert_eq!(reader.records().count(), 4);
}

#[test]
fn test_train_save_reload_predict() {
    let dir = tempdir().unwrap();
    let training = dir.path().join("training.json");
    let test = dir.path().join("test.json");
    write_reviews(&training, 40, false);
    write_reviews(&test, 6, false);

    let config = test_config(dir.path());
    let artifacts_path = config.data.artifacts_path();
    let pipeline = StackingPipeline::new(config);

    let rows = pipeline.process(&training, &ProductAggregator::training()).unwrap();
    let (artifacts, report) = pipeline.train(&rows).unwrap();

    assert_eq!(report.stage_one_products + report.stage_two_products, 40);
    assert_eq!(report.cv_f1.len(), 4);
    assert!(report.cv_f1.iter().all(|f1| (0.0..=1.0).contains(f1)));
    assert_eq!(report.stacking_table.n_rows(), report.stage_two_products);
    assert_eq!(
        &artifacts.feature_columns[..3],
        ["nb_bodies", "nb_summaries", "dt_summaries"]
    );

    artifacts.save(&artifacts_path).unwrap();
    let reloaded = PipelineArtifacts::load(&artifacts_path).unwrap();

    let eval_rows = pipeline.process(&test, &ProductAggregator::evaluation()).unwrap();
    assert!(eval_rows.iter().all(|r| r.label.is_none()));

    let before = pipeline.predict(&artifacts, &eval_rows).unwrap();
    let after = pipeline.predict(&reloaded, &eval_rows).unwrap();
    assert_eq!(before, after);
    assert_eq!(before.len(), 6);

    // the signal is trivially separable
    let correct = before
        .iter()
        .enumerate()
        .filter(|(i, (_, p))| (*p >= 0.5) == (i % 2 == 0))
        .count();
    assert!(correct >= 5, "only {} of 6 products classified correctly", correct);

    let predictions = dir.path().join("predictions.csv");
    let (ids, probabilities): (Vec<String>, Vec<f64>) = before.into_iter().unzip();
    write_predictions(&predictions, &ids, &probabilities).unwrap();
    assert!(std::fs::read_to_string(&predictions).unwrap().starts_with("ProductID,Probability"));
}

#[test]
fn test_stacking_table_csv_round_trip() {
    let dir = tempdir().unwrap();
    let training = dir.path().join("training.json");
    write_reviews(&training, 24, false);

    let pipeline = StackingPipeline::new(test_config(dir.path()));
    let rows = pipeline.process(&training, &ProductAggregator::training()).unwrap();
    let (_, report) = pipeline.train(&rows).unwrap();

    let path = dir.path().join("stacking.csv");
    report
        .stacking_table
        .save_csv(&path, Some(&report.stacking_labels))
        .unwrap();
    let (table, labels) = FeatureTable::load_csv(&path).unwrap();

    assert_eq!(table.columns, report.stacking_table.columns);
    assert_eq!(labels.unwrap(), report.stacking_labels);

    let selection = pipeline.select_features_from_table(&table, &report.stacking_labels);
    assert!(selection.is_ok());
}
