use std::io::Write;

use lh_core::LhError;
use lh_worklist::{parse_dilution, read_dilution, summarize_dilution, stable_hash_string};
use tempfile::NamedTempFile;

const SAMPLE: &str = "\
Well,Vol of dna,Vol of water
A1,5.5,44.5
B1,10,40
C1,2.25,47.75
";

#[test]
fn parses_three_aligned_sequences() {
    let worklist = parse_dilution(SAMPLE.as_bytes()).expect("parse");
    let wells: Vec<String> = worklist.wells().iter().map(|w| w.to_string()).collect();
    assert_eq!(wells, ["A1", "B1", "C1"]);
    let dna: Vec<f64> = worklist.dna_volumes().iter().map(|v| v.as_ul()).collect();
    assert_eq!(dna, [5.5, 10.0, 2.25]);
    let water: Vec<f64> = worklist.water_volumes().iter().map(|v| v.as_ul()).collect();
    assert_eq!(water, [44.5, 40.0, 47.75]);
}

#[test]
fn dna_transfers_keep_row_order_and_pairing() {
    let worklist = parse_dilution(SAMPLE.as_bytes()).expect("parse");
    let transfers = worklist.dna_transfers();
    assert_eq!(transfers.len(), 3);
    for (row, entry) in transfers.rows().iter().zip(worklist.entries()) {
        assert_eq!(row.source, entry.well);
        assert_eq!(row.destination, entry.well);
        assert_eq!(row.volume, entry.dna);
    }
}

#[test]
fn extra_columns_and_whitespace_are_tolerated() {
    let csv = "Sample, Well ,Vol of dna,Vol of water\nS1, a2 , 3 , 47\n\n";
    let worklist = parse_dilution(csv.as_bytes()).expect("parse");
    assert_eq!(worklist.len(), 1);
    assert_eq!(worklist.entries()[0].well.to_string(), "A2");
}

#[test]
fn non_numeric_volume_is_parse_error() {
    let csv = "Well,Vol of dna,Vol of water\nA1,5,45\nB1,n/a,45\n";
    let err = parse_dilution(csv.as_bytes()).expect_err("n/a volume");
    assert!(matches!(err, LhError::Parse(_)), "{err}");
    assert_eq!(err.info().code, "lh_worklist.volume_not_numeric");
    assert_eq!(err.info().context.get("row").map(String::as_str), Some("2"));
    assert_eq!(err.info().context.get("line").map(String::as_str), Some("3"));
    assert_eq!(
        err.info().context.get("column").map(String::as_str),
        Some("Vol of dna")
    );
}

#[test]
fn non_finite_volume_is_parse_error() {
    for raw in ["NaN", "inf", "-inf", "1e400"] {
        let csv = format!("Well,Vol of dna,Vol of water\nA1,{raw},45\n");
        let err = parse_dilution(csv.as_bytes()).expect_err(raw);
        assert!(matches!(err, LhError::Parse(_)), "{raw}: {err}");
        assert_eq!(err.info().code, "lh_worklist.volume_not_numeric");
        assert_eq!(err.info().context.get("row").map(String::as_str), Some("1"));
        assert_eq!(err.info().context.get("line").map(String::as_str), Some("2"));
        assert_eq!(err.info().context.get("value").map(String::as_str), Some(raw));
    }
}

#[test]
fn missing_column_is_parse_error() {
    let csv = "Well,Vol of dna\nA1,5\n";
    let err = parse_dilution(csv.as_bytes()).expect_err("missing water column");
    assert!(matches!(err, LhError::Parse(_)));
    assert_eq!(err.info().code, "lh_worklist.missing_column");
    assert_eq!(
        err.info().context.get("column").map(String::as_str),
        Some("Vol of water")
    );
}

#[test]
fn non_positive_volume_is_configuration_error() {
    let csv = "Well,Vol of dna,Vol of water\nA1,0,45\n";
    let err = parse_dilution(csv.as_bytes()).expect_err("zero volume");
    assert!(matches!(err, LhError::Configuration(_)));
    assert_eq!(err.info().context.get("row").map(String::as_str), Some("1"));
}

#[test]
fn bad_well_is_parse_error() {
    let csv = "Well,Vol of dna,Vol of water\n1A,5,45\n";
    let err = parse_dilution(csv.as_bytes()).expect_err("bad well");
    assert!(matches!(err, LhError::Parse(_)));
    assert_eq!(err.info().code, "lh_core.well_id");
}

#[test]
fn header_only_is_empty_worklist() {
    let err = parse_dilution("Well,Vol of dna,Vol of water\n".as_bytes()).expect_err("empty");
    assert_eq!(err.info().code, "lh_worklist.empty");
}

#[test]
fn reads_from_disk_and_hashes_deterministically() {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(SAMPLE.as_bytes()).expect("write");
    let worklist = read_dilution(file.path()).expect("read");
    let again = parse_dilution(SAMPLE.as_bytes()).expect("parse");
    assert_eq!(
        stable_hash_string(&worklist).unwrap(),
        stable_hash_string(&again).unwrap()
    );

    let summary = summarize_dilution(&worklist).expect("summary");
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.totals[0].total_ul, 17.75);
    assert_eq!(summary.totals[1].max_ul, 47.75);
    assert_eq!(summary.worklist_hash.len(), 64);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("dir");
    let err = read_dilution(&dir.path().join("absent.csv")).expect_err("missing");
    assert!(matches!(err, LhError::Io(_)));
    assert!(err.info().context.contains_key("path"));
}
