//! End-to-end runs of both scoring modes on temporary files

use pwmfit::config::RunConfig;
use pwmfit::io::TableColumns;
use pwmfit::pipeline::{MutantJob, ScoringPipeline, TabularJob};
use pwmfit::weights::WeightMode;
use pwmfit::PwmError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ALIGNMENT: &str = "\
>REF/10-15
ACdEFG
>s1
ACxEFG
>s2
ACyE
YG
>s3
GCzEFG
>s4
ACwDFG
";

const MUTATIONS: &str = "\
# point mutants of REF
mutant;effect
WT;0
A10G;1
E13D,F14Y;2
d12E;3
A11C;4
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn pipeline(configure: impl FnOnce(&mut RunConfig)) -> ScoringPipeline {
    let mut config = RunConfig::default();
    configure(&mut config);
    ScoringPipeline::new(config).unwrap()
}

fn read_rows(path: &Path, separator: char) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.split(separator).map(str::to_string).collect())
        .collect()
}

fn mutant_job(dir: &TempDir, prefix: &str) -> MutantJob {
    MutantJob {
        alignment_file: write(dir, "ref.a2m", ALIGNMENT),
        mutations_file: write(dir, "ref.muts", MUTATIONS),
        output: Some(dir.path().join(prefix)),
    }
}

#[test]
fn test_mutant_run_writes_scores_and_failures() {
    let dir = TempDir::new().unwrap();
    let report = pipeline(|_| {}).run_mutants(&mutant_job(&dir, "full")).unwrap();

    assert_eq!(report.scored, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.summary.num_sequences(), 5);
    assert_eq!(report.summary.alignment_length(), Some(5));

    let rows = read_rows(&report.scores_path, ';');
    assert_eq!(rows[0], vec!["label", "score_2", "score_1"]);
    assert_eq!(rows.len(), 6);
    let labels: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(labels, vec!["WT", "A10G", "E13D,F14Y", "d12E", "A11C"]);

    for row in &rows[1..4] {
        assert!(row[1..].iter().all(|field| field.parse::<f64>().unwrap().is_finite()));
    }
    for row in &rows[4..] {
        assert!(row[1..].iter().all(String::is_empty));
    }

    let fails = fs::read_to_string(report.fails_path.unwrap()).unwrap();
    let lines: Vec<&str> = fails.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("d12E"));
    assert!(lines[1].contains("A11C"));
}

#[test]
fn test_wild_type_relative_run_matches_full_run() {
    let dir = TempDir::new().unwrap();
    let full = pipeline(|c| c.scoring.order = 3)
        .run_mutants(&mutant_job(&dir, "full"))
        .unwrap();
    let relative = pipeline(|c| {
        c.scoring.order = 3;
        c.scoring.wild_type_relative = true;
        c.scoring.threads = true;
    })
    .run_mutants(&mutant_job(&dir, "relative"))
    .unwrap();

    let full_rows = read_rows(&full.scores_path, ';');
    let relative_rows = read_rows(&relative.scores_path, ';');
    assert_eq!(full_rows.len(), relative_rows.len());

    for (a, b) in full_rows.iter().zip(&relative_rows).skip(1) {
        assert_eq!(a[0], b[0]);
        for (x, y) in a[1..].iter().zip(&b[1..]) {
            match (x.parse::<f64>(), y.parse::<f64>()) {
                (Ok(x), Ok(y)) => assert!((x - y).abs() < 1e-8, "{}: {} vs {}", a[0], x, y),
                _ => assert_eq!(x, y),
            }
        }
    }
}

#[test]
fn test_similarity_weighting_and_dedicated_pool() {
    let dir = TempDir::new().unwrap();
    let report = pipeline(|c| {
        c.weighting.mode = WeightMode::Similarity;
        c.weighting.similarity = 80;
        c.scoring.num_threads = 2;
        c.scoring.threads = true;
    })
    .run_mutants(&mutant_job(&dir, "weighted"))
    .unwrap();

    // after insertion removal every record is at least 80% identical to REF
    assert!(report.summary.total_weight() < 5.0);
    assert_eq!(report.scored, 3);
}

#[test]
fn test_wild_type_relative_rejects_order_four() {
    let dir = TempDir::new().unwrap();
    let result = pipeline(|c| {
        c.scoring.order = 4;
        c.scoring.wild_type_relative = true;
    })
    .run_mutants(&mutant_job(&dir, "order4"));
    assert!(matches!(result, Err(PwmError::UnsupportedOrder { order: 4, .. })));
}

#[test]
fn test_malformed_mutation_aborts_run() {
    let dir = TempDir::new().unwrap();
    let job = MutantJob {
        alignment_file: write(&dir, "ref.a2m", ALIGNMENT),
        mutations_file: write(&dir, "bad.muts", "A10G\nA-10G\n"),
        output: Some(dir.path().join("bad")),
    };
    assert!(matches!(
        pipeline(|_| {}).run_mutants(&job),
        Err(PwmError::MalformedMutation(_))
    ));
}

fn tabular_job(dir: &TempDir) -> TabularJob {
    TabularJob {
        training_file: write(
            dir,
            "train.csv",
            "family,seq,w\na,ACGT,1\na,ACGA,2\nb,TTTT,1\na,CCGT,1\n",
        ),
        train_columns: TableColumns::new("seq")
            .with_label(Some("family".to_string()))
            .with_weight(Some("w".to_string())),
        train_label_value: Some("a".to_string()),
        testing_file: write(dir, "test.csv", "name,seq\nt1,ACGT\nt2,ACG\nt3,CCGA\n"),
        test_columns: TableColumns::new("seq").with_label(Some("name".to_string())),
        fraction: 100,
        replicate: 1,
        delimiter: b',',
        output: Some(dir.path().join("test")),
    }
}

#[test]
fn test_tabular_run() {
    let dir = TempDir::new().unwrap();
    let report = pipeline(|_| {}).run_tabular(&tabular_job(&dir)).unwrap();

    assert_eq!(report.scores_path, dir.path().join("test.scores"));
    assert_eq!(report.summary.num_sequences(), 3);
    assert_eq!(report.summary.total_weight(), 4.0);
    assert_eq!(report.scored, 2);
    assert_eq!(report.skipped, 1);

    let rows = read_rows(&report.scores_path, ',');
    assert_eq!(rows[0], vec!["name", "score_2", "score_1"]);
    assert_eq!(rows[2], vec!["t2", "", ""]);

    let t1: f64 = rows[1][1].parse().unwrap();
    let t3: f64 = rows[3][1].parse().unwrap();
    assert!(t1 > t3);
}

#[test]
fn test_tabular_label_column_requires_value() {
    let dir = TempDir::new().unwrap();
    let mut job = tabular_job(&dir);
    job.train_label_value = None;
    assert!(matches!(
        pipeline(|_| {}).run_tabular(&job),
        Err(PwmError::Config(_))
    ));
}

#[test]
fn test_tabular_unknown_column() {
    let dir = TempDir::new().unwrap();
    let mut job = tabular_job(&dir);
    job.test_columns = TableColumns::new("sequence");
    assert!(matches!(
        pipeline(|_| {}).run_tabular(&job),
        Err(PwmError::UnknownColumn { .. })
    ));
}
