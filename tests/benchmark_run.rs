#![allow(missing_docs)]

use std::fs;

use pathbench::catalog::read_catalog;
use pathbench::engine::SqliteEngine;
use pathbench::loader::prepare_table;
use pathbench::{
    executor_for, Benchmark, CompositeIndex, DatasetReader, Engine, EngineUrl, ExecutorKind,
    PathQuery, TableName,
};
use tempfile::TempDir;

const DATASET: &str = "\
/x;1;r1
/x;3;r1
/x;9;r2
/y/a;10;r1
/y/b;50;r1
/y/b/c;60;r2
/z;2;r3
";

fn seeded_db(dir: &TempDir) -> (EngineUrl, TableName) {
    let path = dir.path().join("bench.db");
    let table = TableName::new("cas").unwrap();
    let mut engine = SqliteEngine::open(&path).unwrap();
    let mut reader = DatasetReader::new(DATASET.as_bytes());
    assert_eq!(prepare_table(&mut engine, &table, &mut reader, 3).unwrap(), 7);
    engine.close().unwrap();
    (EngineUrl::SqliteFile(path), table)
}

fn catalog(text: &str) -> Vec<PathQuery> {
    read_catalog(text.as_bytes()).unwrap()
}

fn query_lines(text: &str) -> Vec<(usize, u64, u64)> {
    text.lines()
        .filter_map(|line| line.strip_prefix('Q'))
        .map(|rest| {
            let fields: Vec<&str> = rest.split(';').collect();
            (
                fields[0].parse().unwrap(),
                fields[1].parse().unwrap(),
                fields[2].parse().unwrap(),
            )
        })
        .collect()
}

#[test]
fn two_repetitions_stream_results_and_totals() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(
        catalog("/x;1;5\n/y/*;0;100\n"),
        table,
        CompositeIndex::ValuePath.into(),
    )
    .with_repetitions(2);

    let mut out = Vec::new();
    let stats = bench.run(|| url.connect(), executor.as_ref(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with(
        "Configuration:\n\
         enable_seqscan: off\n\
         cas_idx_vp indisvalid: t\n\
         cas_idx_pv indisvalid: f\n\
         \n"
    ));
    let lines = query_lines(&text);
    let shape: Vec<(usize, u64)> = lines.iter().map(|(q, m, _)| (*q, *m)).collect();
    assert_eq!(shape, [(0, 2), (1, 2), (0, 2), (1, 2)]);

    let blocks: Vec<&str> = text.split("\n\n").collect();
    assert!(blocks[1].starts_with("Q0;") && blocks[1].lines().count() == 2);
    assert!(blocks[2].starts_with("Q0;") && blocks[2].lines().count() == 2);
    assert_eq!(
        blocks[3],
        "Configuration:\n\
         enable_seqscan: on\n\
         cas_idx_vp indisvalid: t\n\
         cas_idx_pv indisvalid: t"
    );

    let total_ms: u64 = lines.iter().map(|(_, _, ms)| ms).sum();
    assert_eq!(stats.queries, 4);
    assert_eq!(stats.total_matches, 8);
    assert_eq!(stats.total_elapsed_ms, total_ms);
    assert!(text.contains(&format!("Totals:\nruntimeMs: {total_ms}\n")));
    assert!(text.contains("nrMatches: 8\n"));
    assert!(text.contains("Averages:\n"));
    assert!(text.contains("nrMatches: 2.000000\n"));
    assert_eq!(bench.measurements().len(), 4);
}

#[test]
fn path_value_selection_reports_inverse_flags() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(
        catalog("/**;0;100\n"),
        table,
        CompositeIndex::PathValue.into(),
    );
    let mut out = Vec::new();
    bench.run(|| url.connect(), executor.as_ref(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("cas_idx_vp indisvalid: f\ncas_idx_pv indisvalid: t\n"));
    assert_eq!(query_lines(&text)[0].1, 7);
}

#[test]
fn count_and_enumerate_executors_agree() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let queries = "/x;0;100\n/y/**;0;55\n/**/c;0;100\n/*;2;9\n/nope;0;10\n";
    let mut totals = Vec::new();
    for kind in [ExecutorKind::Count, ExecutorKind::Enumerate] {
        let executor = executor_for(kind, table.clone());
        let mut bench = Benchmark::new(
            catalog(queries),
            table.clone(),
            CompositeIndex::PathValue.into(),
        );
        let stats = bench
            .run(|| url.connect(), executor.as_ref(), &mut Vec::new())
            .unwrap();
        let counts: Vec<u64> = bench
            .measurements()
            .iter()
            .map(|m| m.result.match_count)
            .collect();
        totals.push((counts, stats.total_matches));
    }
    assert_eq!(totals[0], totals[1]);
    assert_eq!(totals[0].0, [3, 2, 1, 3, 0]);
}

#[test]
fn failing_query_is_skipped_and_run_completes() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(
        catalog("/a(;0;10\n/x;1;5\n"),
        table,
        CompositeIndex::ValuePath.into(),
    );
    let mut out = Vec::new();
    let stats = bench.run(|| url.connect(), executor.as_ref(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(!text.contains("Q0;"));
    assert!(text.contains("Q1;2;"));
    assert_eq!(text.matches("Configuration:").count(), 2);
    assert!(text.contains("enable_seqscan: on\n"));
    assert_eq!(stats.queries, 1);
    assert!(text.contains("nrMatches: 2\n"));
}

#[test]
fn zero_repetitions_report_nan_averages() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(catalog("/x;1;5\n"), table, CompositeIndex::ValuePath.into())
        .with_repetitions(0);
    let mut out = Vec::new();
    let stats = bench.run(|| url.connect(), executor.as_ref(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(query_lines(&text).is_empty());
    assert_eq!(stats.queries, 0);
    assert!(stats.average_matches.is_nan());
    assert!(text.contains("runtimeMs: 0\n"));
    assert!(text.contains("runtimeMs: NaN\n"));
}

#[test]
fn warmup_pass_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Enumerate, table.clone());
    let mut bench = Benchmark::new(
        catalog("/x;1;5\n/y/*;0;100\n"),
        table,
        CompositeIndex::ValuePath.into(),
    )
    .with_warmup(true);
    let mut out = Vec::new();
    bench.run(|| url.connect(), executor.as_ref(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(query_lines(&text).len(), 2);
    assert_eq!(bench.measurements().len(), 2);
}

#[test]
fn run_restores_engine_defaults() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let mut engine = url.connect().unwrap();
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(catalog("/z;0;5\n"), table, CompositeIndex::PathValue.into());
    bench
        .run_on(engine.as_mut(), executor.as_ref(), &mut Vec::new())
        .unwrap();

    assert_eq!(engine.scan_fallback_setting().unwrap().as_deref(), Some("on"));
    for index in ["cas_idx_vp", "cas_idx_pv"] {
        assert_eq!(engine.index_eligibility(index).unwrap().as_deref(), Some("t"));
    }
    engine.close().unwrap();
}

#[test]
fn connection_failure_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let url = EngineUrl::SqliteFile(dir.path().join("missing").join("bench.db"));
    let table = TableName::new("cas").unwrap();
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(catalog("/x;1;5\n"), table, CompositeIndex::ValuePath.into());
    let mut out = Vec::new();
    assert!(bench.run(|| url.connect(), executor.as_ref(), &mut out).is_err());
    assert!(out.is_empty());
}

#[test]
fn export_writes_one_row_per_measurement() {
    let dir = TempDir::new().unwrap();
    let (url, table) = seeded_db(&dir);
    let executor = executor_for(ExecutorKind::Count, table.clone());
    let mut bench = Benchmark::new(
        catalog("/x;1;5\n/y/*;0;100\n"),
        table,
        CompositeIndex::ValuePath.into(),
    )
    .with_repetitions(2);
    bench
        .run(|| url.connect(), executor.as_ref(), &mut Vec::new())
        .unwrap();

    let export = dir.path().join("results.csv");
    bench.export_csv(&export).unwrap();
    let text = fs::read_to_string(&export).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "repetition;query;pattern;low;high;match_count;elapsed_ms");
    assert_eq!(lines.len(), 5);
    assert!(lines[1].starts_with("0;0;/x;1;5;2;"));
    assert!(lines[4].starts_with("1;1;/y/*;0;100;2;"));
}
