use std::{fs, path::Path};

use lf_sampler::{
    data::{
        labels::{Label, LabelEncoding, LabelStore},
        truth::CuratedLabels,
        Split,
    },
    experiment::{self, ExperimentConfig, MarginalRow, OutputWriter, WeightRow},
    model::{GenerativeModel, LabelModel},
    Error,
};
use ndarray::ArrayView2;
use serde::Serialize;
use tempfile::tempdir;

const HEADER: &str = "candidate_id\tlf_kb\tlf_pattern\tlf_cue\tlf_negation";

// Two label functions agree with the hidden class, one is noisy, one only fires negative.
const ROWS: &[&str] = &[
    "1\t1\t1\t-1\t-1",
    "2\t1\t1\t1\t-1",
    "3\t-1\t1\t0\t-1",
    "4\t0\t0\t-1\t0",
    "5\t0\t-1\t0\t0",
    "6\t-1\t0\t1\t0",
    "7\t1\t-1\t1\t-1",
    "8\t-1\t-1\t-1\t-1",
];

fn write_matrix(dir: &Path, split: &str, offset: i64) {
    let body: Vec<String> = ROWS
        .iter()
        .map(|row| {
            let (id, rest) = row.split_once('\t').unwrap();
            format!("{}\t{rest}", id.parse::<i64>().unwrap() + offset)
        })
        .collect();
    fs::write(
        dir.join(format!("{split}.tsv")),
        format!("{HEADER}\n{}\n", body.join("\n")),
    )
    .unwrap();
}

fn write_curated(dir: &Path, split: &str, offset: i64) {
    let truth = [1, 1, 1, 0, 0, 0, 1, 0];
    let mut text = String::from("candidate_id\tcurated\n");
    for (i, value) in truth.iter().enumerate() {
        text.push_str(&format!("{}\t{value}\n", i as i64 + 1 + offset));
    }
    // A blank label is skipped rather than failing the split.
    text.push_str(&format!("{}\t\n", 9 + offset));
    fs::write(dir.join(format!("{split}.tsv")), text).unwrap();
}

#[test]
fn end_to_end_run_writes_every_table() {
    let data = tempdir().unwrap();
    let matrices = data.path().join("label_matrices");
    let curated_dir = data.path().join("curated");
    fs::create_dir_all(&matrices).unwrap();
    fs::create_dir_all(&curated_dir).unwrap();
    write_matrix(&matrices, "train", 0);
    write_matrix(&matrices, "dev", 100);
    write_matrix(&matrices, "test", 200);
    write_curated(&curated_dir, "dev", 100);
    write_curated(&curated_dir, "test", 200);

    let store = LabelStore::load_dir(&matrices, LabelEncoding::Current).unwrap();
    let dev = CuratedLabels::load(&curated_dir.join("dev.tsv"), Split::Dev, "curated").unwrap();
    assert_eq!(dev.len(), 8);
    let curated = vec![
        (Split::Dev, Ok(dev)),
        (
            Split::Test,
            CuratedLabels::load(&curated_dir.join("test.tsv"), Split::Test, "curated"),
        ),
    ];

    let config = ExperimentConfig {
        name: "dag".into(),
        pool: vec![1, 2, 3],
        baseline: vec![0],
        sample_sizes: vec![1, 3],
        num_trials: 2,
        seed: 100,
        regularization: vec![0.01, 2.5],
        workers: Some(2),
    };
    let model = GenerativeModel {
        max_iterations: 10_000,
        ..GenerativeModel::default()
    };
    let out = tempdir().unwrap();
    let dir = out.path().join(&config.name);
    let mut writer = OutputWriter::new(&dir);
    let report = experiment::run(&config, &model, &store, &curated, |batch, records| {
        writer.write_batch(batch, records)
    })
    .unwrap();
    assert_eq!(report.jobs, 5);
    assert_eq!(report.fits, 10);
    // (jobs × strengths) rows for each evaluated split.
    assert_eq!(report.records.len(), 20);
    let keys: Vec<(usize, usize)> = report.records.iter().map(|r| (r.lf_num, r.trial)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let written = writer.finish(&report, &config).unwrap();
    for expected in [
        "marginals/0_sampled_train.tsv",
        "marginals/1_sampled_dev.tsv",
        "marginals/3_sampled_test.tsv",
        "weights/0_sampled_weights.tsv",
        "weights/3_sampled_weights.tsv",
        "results/dev_sampled_results.tsv",
        "results/test_sampled_summary.tsv",
        "manifest.json",
    ] {
        assert!(dir.join(expected).exists(), "missing {expected}");
    }
    assert!(written.len() >= 8);

    let results = fs::read_to_string(dir.join("results/dev_sampled_results.tsv")).unwrap();
    let header = results.lines().next().unwrap();
    assert_eq!(header, "lf_num\ttrial\tregularization\tauroc\taupr\tstatus");
    assert_eq!(results.lines().count(), 1 + 10);

    let weights = fs::read_to_string(dir.join("weights/3_sampled_weights.tsv")).unwrap();
    assert!(weights.lines().skip(1).any(|line| line.contains("lf_negation")));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["experiment"], "dag");
    assert_eq!(manifest["jobs"], 5);
    assert_eq!(manifest["config"]["seed"], 100);
}

#[test]
fn reruns_are_reproducible() {
    let data = tempdir().unwrap();
    write_matrix(data.path(), "train", 0);
    write_matrix(data.path(), "dev", 0);
    write_matrix(data.path(), "test", 0);
    let store = LabelStore::load_dir(data.path(), LabelEncoding::Current).unwrap();
    let config = ExperimentConfig {
        name: "repeat".into(),
        pool: vec![0, 1, 2, 3],
        baseline: Vec::new(),
        sample_sizes: vec![2],
        num_trials: 3,
        seed: 7,
        regularization: vec![1.0],
        workers: None,
    };
    let model = GenerativeModel {
        max_iterations: 10_000,
        ..GenerativeModel::default()
    };
    let collect = || {
        let mut rows: (Vec<MarginalRow>, Vec<WeightRow>) = Default::default();
        let report = experiment::run(&config, &model, &store, &[], |batch, _| {
            rows.0.extend(batch.marginals.values().flatten().cloned());
            rows.1.extend(batch.weights.iter().cloned());
            Ok(())
        })
        .unwrap();
        assert!(report.records.is_empty());
        rows
    };
    let (first_marginals, first_weights) = collect();
    let (second_marginals, second_weights) = collect();
    assert!(!first_marginals.is_empty());
    assert_eq!(first_marginals, second_marginals);
    assert_eq!(first_weights, second_weights);
}

/// Label matrices under `data/label_matrices`; curated files go in `data`.
fn curated_fixture(data: &Path) -> LabelStore {
    let matrices = data.join("label_matrices");
    fs::create_dir_all(&matrices).unwrap();
    write_matrix(&matrices, "train", 0);
    write_matrix(&matrices, "dev", 100);
    write_matrix(&matrices, "test", 200);
    LabelStore::load_dir(&matrices, LabelEncoding::Current).unwrap()
}

fn sized_config(name: &str) -> ExperimentConfig {
    ExperimentConfig {
        name: name.into(),
        pool: vec![1, 2, 3],
        baseline: vec![0],
        sample_sizes: vec![1, 3],
        num_trials: 2,
        seed: 100,
        regularization: vec![0.01, 2.5],
        workers: Some(2),
    }
}

#[test]
fn malformed_curated_file_fails_only_its_split() {
    let data = tempdir().unwrap();
    let store = curated_fixture(data.path());
    write_curated(data.path(), "dev", 100);
    fs::write(data.path().join("test.tsv"), "candidate_id\tcurated\n201\t1\n205\t2\n").unwrap();

    let test = CuratedLabels::load(&data.path().join("test.tsv"), Split::Test, "curated");
    assert!(test.is_err());
    let curated = vec![
        (
            Split::Dev,
            CuratedLabels::load(&data.path().join("dev.tsv"), Split::Dev, "curated"),
        ),
        (Split::Test, test),
    ];
    let model = GenerativeModel {
        max_iterations: 10_000,
        ..GenerativeModel::default()
    };
    let out = tempdir().unwrap();
    let mut writer = OutputWriter::new(out.path());
    let report = experiment::run(&sized_config("partial"), &model, &store, &curated, |batch, records| {
        writer.write_batch(batch, records)
    })
    .unwrap();

    let (dev, test): (Vec<_>, Vec<_>) = report.records.iter().partition(|r| r.split == Split::Dev);
    assert_eq!(dev.len(), 10);
    assert!(dev.iter().all(|r| r.is_ok()));
    assert_eq!(test.len(), 10);
    assert!(test.iter().all(|r| r.status == "data_integrity_error"));
    assert!(out.path().join("results/dev_sampled_summary.tsv").exists());
    let results = fs::read_to_string(out.path().join("results/test_sampled_results.tsv")).unwrap();
    assert!(results.lines().skip(1).all(|line| line.ends_with("data_integrity_error")));
}

#[test]
fn finished_sizes_are_on_disk_when_a_later_batch_fails() {
    let data = tempdir().unwrap();
    let store = curated_fixture(data.path());
    write_curated(data.path(), "dev", 100);
    let curated = vec![(
        Split::Dev,
        CuratedLabels::load(&data.path().join("dev.tsv"), Split::Dev, "curated"),
    )];
    let model = GenerativeModel {
        max_iterations: 10_000,
        ..GenerativeModel::default()
    };
    let out = tempdir().unwrap();
    let mut writer = OutputWriter::new(out.path());
    let result = experiment::run(&sized_config("crash"), &model, &store, &curated, |batch, records| {
        if batch.lf_num == 3 {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        writer.write_batch(batch, records)
    });
    assert!(result.is_err());

    for done in ["marginals/0_sampled_train.tsv", "marginals/1_sampled_dev.tsv", "weights/1_sampled_weights.tsv"] {
        assert!(out.path().join(done).exists(), "missing {done}");
    }
    assert!(!out.path().join("marginals/3_sampled_train.tsv").exists());
    let results = fs::read_to_string(out.path().join("results/dev_sampled_results.tsv")).unwrap();
    // Baseline plus two trials of size 1, at two strengths each.
    assert_eq!(results.lines().count(), 1 + 6);
}

#[test]
fn failed_fits_leave_failed_rows_and_no_marginals() {
    let data = tempdir().unwrap();
    let store = curated_fixture(data.path());
    write_curated(data.path(), "dev", 100);
    let curated = vec![(
        Split::Dev,
        CuratedLabels::load(&data.path().join("dev.tsv"), Split::Dev, "curated"),
    )];
    let model = GenerativeModel {
        max_iterations: 1,
        tolerance: 0.0,
        ..GenerativeModel::default()
    };
    let mut marginals = 0;
    let mut weights = 0;
    let report = experiment::run(&sized_config("stalled"), &model, &store, &curated, |batch, _| {
        marginals += batch.marginals.values().map(Vec::len).sum::<usize>();
        weights += batch.weights.len();
        Ok(())
    })
    .unwrap();
    assert_eq!(report.fits, 10);
    assert_eq!(report.failed_fits, 10);
    assert_eq!(report.records.len(), 10);
    assert!(report.records.iter().all(|r| r.status == "non_convergence" && r.auroc.is_nan()));
    assert_eq!(marginals, 0);
    assert_eq!(weights, 0);
}

/// Converges below `max_strength` and gives up above it.
#[derive(Debug, Clone, Serialize)]
struct CappedModel {
    inner: GenerativeModel,
    max_strength: f64,
}

impl LabelModel for CappedModel {
    type Fitted = <GenerativeModel as LabelModel>::Fitted;

    fn fit(&self, matrix: ArrayView2<'_, Label>) -> lf_sampler::Result<Self::Fitted> {
        if self.regularization() > self.max_strength {
            return Err(Error::NonConvergence {
                iterations: 0,
                delta: f64::INFINITY,
            });
        }
        self.inner.fit(matrix)
    }

    fn with_regularization(&self, strength: f64) -> Self {
        Self {
            inner: self.inner.with_regularization(strength),
            ..self.clone()
        }
    }

    fn regularization(&self) -> f64 {
        self.inner.regularization()
    }
}

#[test]
fn failed_strength_leaves_sibling_strengths_intact() {
    let data = tempdir().unwrap();
    let store = curated_fixture(data.path());
    write_curated(data.path(), "dev", 100);
    let curated = vec![(
        Split::Dev,
        CuratedLabels::load(&data.path().join("dev.tsv"), Split::Dev, "curated"),
    )];
    let model = CappedModel {
        inner: GenerativeModel {
            max_iterations: 10_000,
            ..GenerativeModel::default()
        },
        max_strength: 1.0,
    };
    let mut strengths = Vec::new();
    let report = experiment::run(&sized_config("capped"), &model, &store, &curated, |batch, _| {
        strengths.extend(batch.marginals.values().flatten().map(|row| row.regularization));
        strengths.extend(batch.weights.iter().map(|row| row.regularization));
        Ok(())
    })
    .unwrap();

    assert_eq!(report.failed_fits, 5);
    for record in &report.records {
        if record.regularization > 1.0 {
            assert_eq!(record.status, "non_convergence");
        } else {
            assert!(record.is_ok(), "{record:?}");
        }
    }
    assert!(!strengths.is_empty());
    assert!(strengths.iter().all(|s| *s == 0.01));
}
