use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;

use csv_hash_join::{JoinConfig, JoinError, JoinKind, run};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p
}

fn parse_output(bytes: &[u8], delimiter: u8) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_reader(bytes);
    let mut rows: Vec<Vec<String>> = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    let header = rows.remove(0);
    (header, rows)
}

fn join(cfg: &JoinConfig) -> (Vec<String>, Vec<Vec<String>>) {
    let mut out = Vec::new();
    run(cfg, &mut out).unwrap();
    parse_output(&out, b',')
}

fn sorted(mut rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    rows.sort();
    rows
}

fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// Nested-loop join used as the reference result.
fn reference_join(
    first: &[Vec<String>],
    first_key: usize,
    first_width: usize,
    second: &[Vec<String>],
    second_key: usize,
    kind: JoinKind,
) -> Vec<Vec<String>> {
    let strip = |row: &Vec<String>| -> Vec<String> {
        row.iter()
            .enumerate()
            .filter(|(i, _)| *i != second_key)
            .map(|(_, f)| f.clone())
            .collect()
    };
    let mut out = Vec::new();
    match kind {
        JoinKind::Inner | JoinKind::Left => {
            for a in first {
                let mut hit = false;
                for b in second.iter().filter(|b| b[second_key] == a[first_key]) {
                    hit = true;
                    out.push(a.iter().cloned().chain(strip(b)).collect());
                }
                if !hit && kind == JoinKind::Left {
                    let pad = vec![String::new(); second.first().map_or(0, |b| b.len() - 1)];
                    out.push(a.iter().cloned().chain(pad).collect());
                }
            }
        }
        JoinKind::Right => {
            for b in second {
                let mut hit = false;
                for a in first.iter().filter(|a| a[first_key] == b[second_key]) {
                    hit = true;
                    out.push(a.iter().cloned().chain(strip(b)).collect());
                }
                if !hit {
                    out.push(
                        std::iter::repeat_n(String::new(), first_width)
                            .chain(strip(b))
                            .collect(),
                    );
                }
            }
        }
    }
    sorted(out)
}

struct Generated {
    _dir: tempfile::TempDir,
    first: PathBuf,
    second: PathBuf,
    first_rows: Vec<Vec<String>>,
    second_rows: Vec<Vec<String>>,
}

/// Two inputs with duplicate keys on both sides, keys present on one side
/// only, and fields that need quoting.
fn generated() -> Generated {
    let dir = tempfile::tempdir().unwrap();
    let mut seed: u64 = 0x5eed;
    let mut next = move |m: u64| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) % m
    };

    let mut first_rows = Vec::new();
    for i in 0..240 {
        let key = format!("k{}", next(60));
        let note = if i % 17 == 0 {
            format!("note, with comma {i}")
        } else if i % 23 == 0 {
            format!("two\nlines {i}")
        } else {
            format!("n{i}")
        };
        first_rows.push(vec![i.to_string(), key, note]);
    }
    let mut second_rows = Vec::new();
    for i in 0..180 {
        let key = format!("k{}", 30 + next(60));
        second_rows.push(vec![format!("s{i}"), key, format!("{}", next(1000))]);
    }

    let render = |header: &[&str], rows: &[Vec<String>]| {
        let mut w = csv::Writer::from_writer(Vec::new());
        w.write_record(header).unwrap();
        for r in rows {
            w.write_record(r).unwrap();
        }
        String::from_utf8(w.into_inner().unwrap()).unwrap()
    };
    let first = write(
        dir.path(),
        "first.csv",
        &render(&["id", "key", "note"], &first_rows),
    );
    let second = write(
        dir.path(),
        "second.csv",
        &render(&["sid", "key", "score"], &second_rows),
    );
    Generated {
        _dir: dir,
        first,
        second,
        first_rows,
        second_rows,
    }
}

#[test]
fn partitions_batches_and_jobs_do_not_change_the_result() {
    let g = generated();
    let tmp = tempfile::tempdir().unwrap();
    for kind in JoinKind::ALL {
        let expected = reference_join(&g.first_rows, 1, 3, &g.second_rows, 1, kind);
        for partitions in [1, 3, 7] {
            for batch in [1, 16, 1000] {
                for jobs in [1, 3] {
                    let cfg = JoinConfig::new(&g.first, &g.second, "key", kind)
                        .with_partitions(partitions)
                        .with_batch_size(batch)
                        .with_jobs(jobs)
                        .with_temp_dir(tmp.path());
                    let (header, rows) = join(&cfg);
                    assert_eq!(header, vec!["id", "key", "note", "sid", "score"]);
                    assert_eq!(
                        sorted(rows),
                        expected,
                        "{kind} partitions={partitions} batch={batch} jobs={jobs}"
                    );
                    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
                }
            }
        }
    }
}

#[test]
fn parallel_output_keeps_partition_order() {
    let g = generated();
    let tmp = tempfile::tempdir().unwrap();
    let base = JoinConfig::new(&g.first, &g.second, "key", JoinKind::Left)
        .with_partitions(5)
        .with_batch_size(8)
        .with_temp_dir(tmp.path());
    let (_, sequential) = join(&base);
    let (_, parallel) = join(&base.clone().with_jobs(4));
    assert_eq!(sequential, parallel);
}

#[test]
fn repeated_runs_are_identical() {
    let g = generated();
    let cfg = JoinConfig::new(&g.first, &g.second, "key", JoinKind::Right).with_partitions(4);
    assert_eq!(join(&cfg), join(&cfg));
}

#[test]
fn small_scenario_all_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.csv", "id,name\n1,a\n2,b\n");
    let b = write(dir.path(), "b.csv", "id,val\n1,x\n3,z\n");
    let cases = [
        (JoinKind::Inner, table(&[&["1", "a", "x"]])),
        (JoinKind::Left, table(&[&["1", "a", "x"], &["2", "b", ""]])),
        (JoinKind::Right, table(&[&["", "", "z"], &["1", "a", "x"]])),
    ];
    for (kind, expected) in cases {
        for partitions in [1, 2, 3] {
            let cfg = JoinConfig::new(&a, &b, "id", kind)
                .with_partitions(partitions)
                .with_temp_dir(dir.path().join("tmp"));
            let (header, rows) = join(&cfg);
            assert_eq!(header, vec!["id", "name", "val"]);
            assert_eq!(sorted(rows), expected, "{kind} partitions={partitions}");
        }
    }
}

const PEOPLE: &str = "id,firstname,lastname\n\
1,John,Smith\n\
2,Anna,Brown\n\
3,Peter,Jones\n\
4,John,Miller\n";

const CONTACTS: &str = "email,firstname,city\n\
john@example.org,John,Oslo\n\
maria@example.org,Maria,Porto\n\
peter@example.org,Peter,Lyon\n";

#[test]
fn join_on_a_non_leading_column() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "people.csv", PEOPLE);
    let b = write(dir.path(), "contacts.csv", CONTACTS);

    let inner = JoinConfig::new(&a, &b, "firstname", JoinKind::Inner).with_partitions(3);
    let (header, rows) = join(&inner);
    assert_eq!(header, vec!["id", "firstname", "lastname", "email", "city"]);
    assert_eq!(
        sorted(rows),
        table(&[
            &["1", "John", "Smith", "john@example.org", "Oslo"],
            &["3", "Peter", "Jones", "peter@example.org", "Lyon"],
            &["4", "John", "Miller", "john@example.org", "Oslo"],
        ])
    );

    let left = JoinConfig::new(&a, &b, "firstname", JoinKind::Left).with_batch_size(1);
    let (_, rows) = join(&left);
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&vec![
        "2".to_string(),
        "Anna".into(),
        "Brown".into(),
        String::new(),
        String::new()
    ]));

    let right = JoinConfig::new(&a, &b, "firstname", JoinKind::Right).with_partitions(2);
    let (_, rows) = join(&right);
    assert_eq!(rows.len(), 4);
    assert!(rows.contains(&vec![
        String::new(),
        String::new(),
        String::new(),
        "maria@example.org".into(),
        "Porto".into()
    ]));
}

#[test]
fn output_follows_first_input_format() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.txt", "id;name\n1;a\n2;b\n");
    let b = write(dir.path(), "b.tsv", "val\tid\nx\t1\ny\t2\n");
    let cfg = JoinConfig::new(&a, &b, "id", JoinKind::Inner).with_partitions(2);
    let mut out = Vec::new();
    run(&cfg, &mut out).unwrap();
    let (header, rows) = parse_output(&out, b';');
    assert_eq!(header, vec!["id", "name", "val"]);
    assert_eq!(sorted(rows), table(&[&["1", "a", "x"], &["2", "b", "y"]]));
}

#[test]
fn empty_inputs_give_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.csv", "id,name\n");
    let b = write(dir.path(), "b.csv", "id,val\n1,x\n");
    for kind in [JoinKind::Inner, JoinKind::Left] {
        let cfg = JoinConfig::new(&a, &b, "id", kind).with_partitions(3);
        let (header, rows) = join(&cfg);
        assert_eq!(header.len(), 3);
        assert!(rows.is_empty(), "{kind}");
    }
}

#[test]
fn key_counts_match_across_partition_counts() {
    let g = generated();
    let count = |partitions| {
        let cfg = JoinConfig::new(&g.first, &g.second, "key", JoinKind::Inner)
            .with_partitions(partitions);
        let (_, rows) = join(&cfg);
        let mut per_key: HashMap<String, usize> = HashMap::new();
        for r in rows {
            *per_key.entry(r[1].clone()).or_default() += 1;
        }
        per_key
    };
    assert_eq!(count(1), count(6));
}

#[test]
fn errors_surface_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.csv", "id,name\n1,a\n");
    let b = write(dir.path(), "b.csv", "ident,val\n1,x\n");
    let empty = write(dir.path(), "empty.csv", "");

    let mut out = Vec::new();
    let err = run(&JoinConfig::new(&a, &b, "id", JoinKind::Inner), &mut out).unwrap_err();
    assert!(matches!(err, JoinError::ColumnNotFound { .. }));
    assert!(out.is_empty());

    let err = run(
        &JoinConfig::new(&a, dir.path().join("missing.csv"), "id", JoinKind::Inner),
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, JoinError::NotFound { .. }));

    let err = run(&JoinConfig::new(&a, &empty, "id", JoinKind::Inner), &mut out).unwrap_err();
    assert!(matches!(err, JoinError::Format { .. }));
    assert!(out.is_empty());
}

#[test]
fn leading_apostrophe_values_keep_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(
        dir.path(),
        "a.csv",
        "id,name\n1,'90s band\n2,x\n3,'s-Hertogenbosch\n",
    );
    let b = write(dir.path(), "b.csv", "id,v\n1,p\n2,q\n3,r\n");
    for partitions in [1, 2] {
        let cfg = JoinConfig::new(&a, &b, "id", JoinKind::Left).with_partitions(partitions);
        let (header, rows) = join(&cfg);
        assert_eq!(header, vec!["id", "name", "v"]);
        assert_eq!(
            sorted(rows),
            table(&[
                &["1", "'90s band", "p"],
                &["2", "x", "q"],
                &["3", "'s-Hertogenbosch", "r"],
            ])
        );
    }
}
