use std::fs::File;
use std::io::Write;

use pillwheel_config::{HopperCfg, load_prescription_csv, validate_hoppers};
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rx.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn loads_rows_in_declaration_order() {
    let (_dir, path) = write_csv(&["label,channel,required", "Vitamin D,0,2", "Vitamin C, 1, 1"]);
    let rows = load_prescription_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            HopperCfg {
                label: "Vitamin D".into(),
                channel: 0,
                required: 2
            },
            HopperCfg {
                label: "Vitamin C".into(),
                channel: 1,
                required: 1
            },
        ]
    );
    validate_hoppers(&rows).unwrap();
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv(&["name,channel,count", "Vitamin D,0,2"]);
    let err = load_prescription_csv(&path).expect_err("should fail on headers");
    assert!(
        format!("{err}").contains("prescription CSV must have headers 'label,channel,required'")
    );
}

#[rstest]
fn reports_bad_row_with_line_number() {
    let (_dir, path) = write_csv(&["label,channel,required", "Vitamin D,0,2", "Vitamin C,one,1"]);
    let err = load_prescription_csv(&path).expect_err("should fail on row");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}

#[rstest]
fn rejects_header_only_file() {
    let (_dir, path) = write_csv(&["label,channel,required"]);
    let err = load_prescription_csv(&path).expect_err("should fail when empty");
    assert!(format!("{err}").contains("has no rows"));
}

#[rstest]
fn missing_file_names_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.csv");
    let err = load_prescription_csv(&path).expect_err("should fail to open");
    assert!(format!("{err}").contains("open prescription CSV"));
}
