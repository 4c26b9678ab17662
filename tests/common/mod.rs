//! Shared helpers for reading back generated workbooks

#![allow(dead_code)]

use calamine::{open_workbook, Data, Reader, Xlsx};
use quick_xml::events::Event;
use std::fs;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` to `name` inside the temp dir and return its path.
pub fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Sheet names and the rows of the first sheet, read with calamine.
pub fn read_workbook(path: &Path) -> (Vec<String>, Vec<Vec<Data>>) {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("workbook should open");
    let names = workbook.sheet_names();
    let range = workbook
        .worksheet_range(&names[0])
        .expect("first sheet should be readable");
    let rows = range.rows().map(|row| row.to_vec()).collect();
    (names, rows)
}

pub fn text(value: &str) -> Data {
    Data::String(value.to_string())
}

/// Raw XML of one part of the package.
pub fn read_part(path: &Path, name: &str) -> String {
    let file = fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut part = archive.by_name(name).unwrap();
    let mut contents = String::new();
    part.read_to_string(&mut contents).unwrap();
    contents
}

/// Entries of `xl/sharedStrings.xml` in index order.
pub fn shared_strings(path: &Path) -> Vec<String> {
    let contents = read_part(path, "xl/sharedStrings.xml");
    let mut reader = quick_xml::Reader::from_str(&contents);
    let mut strings = Vec::new();
    let mut buf = Vec::new();
    let mut is_t = false;
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => is_t = b"t" == e.name(),
            Ok(Event::Text(e)) => {
                if is_t {
                    strings.push(e.unescape_and_decode(&reader).unwrap());
                    is_t = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => panic!("bad sharedStrings.xml: {:?}", err),
            _ => (),
        }
        buf.clear();
    }
    strings
}
