//! End-to-end select tests: load a file into a table (with and without
//! an index), then run selects through the planner and check the
//! streamed output.

use std::io::Write;
use tarn_common::{StorageConfig, TarnError};
use tarn_engine::{load, CompOp, Condition, Projection, SelectPlanner};
use tempfile::{tempdir, TempDir};

/// Writes `lines` to a load file and loads them into table `t`.
fn setup_table(lines: &[&str], with_index: bool) -> (TempDir, StorageConfig) {
    let dir = tempdir().unwrap();
    let config = StorageConfig {
        data_dir: dir.path().join("data"),
        fsync_enabled: false,
    };

    let loadfile = dir.path().join("records.del");
    let mut file = std::fs::File::create(&loadfile).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    drop(file);

    let rows = load(&config, "t", &loadfile, with_index).unwrap();
    assert_eq!(rows, lines.len());

    (dir, config)
}

/// Runs a select and returns its output plus the match count.
fn run_select(
    config: &StorageConfig,
    projection: Projection,
    conds: &[Condition],
) -> (String, usize) {
    let planner = SelectPlanner::new(config.clone());
    let mut out = Vec::new();
    let count = planner.select(projection, "t", conds, &mut out).unwrap();
    (String::from_utf8(out).unwrap(), count)
}

#[test]
fn test_select_all_rows_without_conditions() {
    let (_dir, config) = setup_table(&["1,one", "2,two", "3,three"], true);

    let (output, count) = run_select(&config, Projection::All, &[]);
    assert_eq!(count, 3);
    assert_eq!(output, "1 'one'\n2 'two'\n3 'three'\n");
}

#[test]
fn test_select_key_range_with_ne_residual() {
    let (_dir, config) = setup_table(&["10,a", "15,b", "20,c", "25,d"], true);

    let conds = vec![
        Condition::key(CompOp::Ge, 10),
        Condition::key(CompOp::Le, 20),
        Condition::key(CompOp::Ne, 15),
    ];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 2);
    assert_eq!(output, "10\n20\n");
}

#[test]
fn test_select_conflicting_equalities_is_empty() {
    let (_dir, config) = setup_table(&["5,five", "7,seven"], true);

    let conds = vec![
        Condition::key(CompOp::Eq, 5),
        Condition::key(CompOp::Eq, 7),
    ];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 0);
    assert!(output.is_empty());

    // With a count projection the zero still gets printed.
    let (output, count) = run_select(&config, Projection::Count, &conds);
    assert_eq!(count, 0);
    assert_eq!(output, "0\n");
}

#[test]
fn test_select_point_query() {
    let (_dir, config) = setup_table(&["10,ten", "20,twenty", "30,thirty"], true);

    let conds = vec![Condition::key(CompOp::Eq, 20)];
    let (output, count) = run_select(&config, Projection::All, &conds);
    assert_eq!(count, 1);
    assert_eq!(output, "20 'twenty'\n");

    let conds = vec![Condition::key(CompOp::Eq, 25)];
    let (output, count) = run_select(&config, Projection::All, &conds);
    assert_eq!(count, 0);
    assert!(output.is_empty());
}

#[test]
fn test_select_count_projection() {
    let (_dir, config) = setup_table(&["1,a", "2,b", "3,c", "4,d"], true);

    let conds = vec![Condition::key(CompOp::Gt, 1)];
    let (output, count) = run_select(&config, Projection::Count, &conds);
    assert_eq!(count, 3);
    assert_eq!(output, "3\n");
}

#[test]
fn test_select_value_projection() {
    let (_dir, config) = setup_table(&["1,alpha", "2,beta"], true);

    let conds = vec![Condition::key(CompOp::Le, 1)];
    let (output, count) = run_select(&config, Projection::Value, &conds);
    assert_eq!(count, 1);
    assert_eq!(output, "alpha\n");
}

#[test]
fn test_select_value_residual_over_index_range() {
    let (_dir, config) = setup_table(&["1,keep", "2,drop", "3,keep", "4,drop"], true);

    let conds = vec![
        Condition::key(CompOp::Ge, 1),
        Condition::value(CompOp::Eq, "keep"),
    ];
    let (output, count) = run_select(&config, Projection::All, &conds);
    assert_eq!(count, 2);
    assert_eq!(output, "1 'keep'\n3 'keep'\n");
}

#[test]
fn test_select_value_condition_without_key_bounds() {
    let (_dir, config) = setup_table(&["1,x", "2,y", "3,x"], true);

    let conds = vec![Condition::value(CompOp::Eq, "x")];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 2);
    assert_eq!(output, "1\n3\n");
}

#[test]
fn test_select_without_index_falls_back_to_heap() {
    let (_dir, config) = setup_table(&["10,a", "20,b", "30,c"], false);

    let conds = vec![
        Condition::key(CompOp::Ge, 15),
        Condition::key(CompOp::Le, 25),
    ];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 1);
    assert_eq!(output, "20\n");
}

#[test]
fn test_select_range_starting_in_gap() {
    let (_dir, config) = setup_table(&["10,a", "15,b", "20,c"], true);

    let conds = vec![Condition::key(CompOp::Ge, 12)];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 2);
    assert_eq!(output, "15\n20\n");
}

#[test]
fn test_select_range_past_everything() {
    let (_dir, config) = setup_table(&["10,a", "20,b"], true);

    let conds = vec![Condition::key(CompOp::Ge, 100)];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 0);
    assert!(output.is_empty());
}

#[test]
fn test_select_range_beyond_i32_is_empty() {
    let (_dir, config) = setup_table(&["10,a"], true);

    let conds = vec![Condition::key(CompOp::Gt, i32::MAX as i64)];
    let (_, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 0);
}

#[test]
fn test_select_missing_table() {
    let dir = tempdir().unwrap();
    let config = StorageConfig {
        data_dir: dir.path().join("data"),
        fsync_enabled: false,
    };

    let planner = SelectPlanner::new(config);
    let mut out = Vec::new();
    let result = planner.select(Projection::Key, "nope", &[], &mut out);
    assert!(matches!(result, Err(TarnError::TableNotFound(t)) if t == "nope"));
}

#[test]
fn test_select_over_larger_load() {
    let lines: Vec<String> = (0..1000).map(|i| format!("{},row {}", i, i)).collect();
    let refs: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
    let (_dir, config) = setup_table(&refs, true);

    let conds = vec![
        Condition::key(CompOp::Ge, 250),
        Condition::key(CompOp::Lt, 260),
    ];
    let (output, count) = run_select(&config, Projection::Key, &conds);
    assert_eq!(count, 10);
    let expected: String = (250..260).map(|i| format!("{}\n", i)).collect();
    assert_eq!(output, expected);

    let conds = vec![Condition::key(CompOp::Eq, 777)];
    let (output, _) = run_select(&config, Projection::All, &conds);
    assert_eq!(output, "777 'row 777'\n");
}

#[test]
fn test_load_parses_quoted_values() {
    let (_dir, config) = setup_table(&["1, 'hello, world'", "2, \"two\"", "3,"], true);

    let (output, count) = run_select(&config, Projection::All, &[]);
    assert_eq!(count, 3);
    assert_eq!(output, "1 'hello, world'\n2 'two'\n3 ''\n");
}

#[test]
fn test_load_rejects_duplicate_keys_in_index() {
    let dir = tempdir().unwrap();
    let config = StorageConfig {
        data_dir: dir.path().join("data"),
        fsync_enabled: false,
    };

    let loadfile = dir.path().join("dup.del");
    std::fs::write(&loadfile, "1,a\n1,b\n").unwrap();

    let result = load(&config, "t", &loadfile, true);
    assert!(matches!(result, Err(TarnError::DuplicateKey(1))));
}
