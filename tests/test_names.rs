//! Tests for input/output name normalization

use chrono::NaiveDate;
use csv2xlsx::names::{normalize_output_name, normalize_source_name};
use csv2xlsx::{ConversionRequest, DerivedPaths};
use std::path::PathBuf;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

#[test]
fn test_source_suffix_appended_when_missing() {
    assert_eq!(normalize_source_name("data"), "data.csv");
    assert_eq!(normalize_source_name("dir/data.txt"), "dir/data.txt.csv");
}

#[test]
fn test_source_suffix_kept_in_any_case() {
    assert_eq!(normalize_source_name("data.csv"), "data.csv");
    assert_eq!(normalize_source_name("DATA.CSV"), "DATA.CSV");
}

#[test]
fn test_source_normalization_is_idempotent() {
    let once = normalize_source_name("data");
    let twice = normalize_source_name(&once);
    assert_eq!(once, twice);
}

#[test]
fn test_output_with_and_without_suffix_converge() {
    assert_eq!(normalize_output_name("report.xlsx", day()), "report 19-10-2026.xlsx");
    assert_eq!(normalize_output_name("report", day()), "report 19-10-2026.xlsx");
}

#[test]
fn test_output_suffix_detected_in_any_case() {
    assert_eq!(normalize_output_name("REPORT.XLSX", day()), "REPORT 19-10-2026.xlsx");
}

#[test]
fn test_output_normalization_is_additive() {
    let once = normalize_output_name("report", day());
    let twice = normalize_output_name(&once, day());
    assert_eq!(twice, "report 19-10-2026 19-10-2026.xlsx");
}

#[test]
fn test_derived_paths() {
    let request = ConversionRequest::new("sales", ";", "summary.xlsx");
    let paths = DerivedPaths::derive(&request, day());

    assert_eq!(paths.input, PathBuf::from("sales.csv"));
    assert_eq!(paths.output, PathBuf::from("summary 19-10-2026.xlsx"));
    assert_eq!(paths.sheet_name, "summary.xlsx", "sheet is named before date stamping");
}
