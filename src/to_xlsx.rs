//! Minimal xlsx writer: one workbook held in memory, written out as an
//! Office Open XML package when closed.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLS: u32 = 16_384;
pub const MAX_STRING_LEN: usize = 32_767;
pub const MAX_SHEET_NAME_LEN: usize = 31;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"</Types>"#,
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
    r#"</Relationships>"#,
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Text that Excel would read as an escape sequence.
static ESCAPE_LOOKALIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_x[0-9A-Fa-f]{4}_").expect("valid pattern"));

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookOptions {
    /// Store text that parses as a finite number as a numeric cell.
    pub strings_to_numbers: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Number(f64),
    Shared(usize),
}

#[derive(Debug, Default)]
struct Sheet {
    name: Option<String>,
    rows: BTreeMap<u32, BTreeMap<u32, Cell>>,
}

#[derive(Debug, Default)]
struct SharedStrings {
    index: HashMap<String, usize>,
    strings: Vec<String>,
    references: usize,
}

impl SharedStrings {
    fn intern(&mut self, text: String) -> usize {
        self.references += 1;
        if let Some(&idx) = self.index.get(&text) {
            return idx;
        }
        let idx = self.strings.len();
        self.strings.push(text.clone());
        self.index.insert(text, idx);
        idx
    }
}

/// A workbook with a single worksheet.
#[derive(Debug)]
pub struct Workbook {
    path: PathBuf,
    options: WorkbookOptions,
    sheet: Sheet,
    shared: SharedStrings,
}

impl Workbook {
    /// Checks that `path` can hold a workbook. Nothing is written until
    /// [`Workbook::close`].
    pub fn create<P: AsRef<Path>>(path: P, options: WorkbookOptions) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();
        let creation_error = |reason: &str| ConvertError::WorkbookCreation {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if path.file_name().is_none() {
            return Err(creation_error("path has no file name"));
        }
        if path.is_dir() {
            return Err(creation_error("path is a directory"));
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                return Err(creation_error("parent directory does not exist"));
            }
            _ => (),
        }

        Ok(Workbook {
            path,
            options,
            sheet: Sheet::default(),
            shared: SharedStrings::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names the worksheet. Without a name it is written as `Sheet1`.
    pub fn add_worksheet(&mut self, name: &str) -> Result<(), ConvertError> {
        let sheet_error = |reason| ConvertError::SheetCreation {
            name: name.to_string(),
            reason,
        };
        validate_sheet_name(name).map_err(sheet_error)?;
        if self.sheet.name.is_some() {
            return Err(sheet_error("workbook already has a worksheet"));
        }
        self.sheet.name = Some(name.to_string());
        Ok(())
    }

    /// Writes `fields` into consecutive cells starting at (`row`, `col`).
    /// Empty fields leave their cell blank.
    pub fn write_row<S: AsRef<str>>(
        &mut self,
        row: u32,
        col: u32,
        fields: &[S],
    ) -> Result<(), ConvertError> {
        if row >= MAX_ROWS {
            return Err(ConvertError::OutOfBounds { row, col });
        }
        let last_col = col as u64 + fields.len() as u64;
        if last_col > MAX_COLS as u64 {
            return Err(ConvertError::OutOfBounds {
                row,
                col: MAX_COLS,
            });
        }

        for (offset, field) in fields.iter().enumerate() {
            let col = col + offset as u32;
            let cell = match self.make_cell(field.as_ref(), row, col) {
                Some(cell) => cell,
                None => continue,
            };
            self.sheet
                .rows
                .entry(row)
                .or_insert_with(BTreeMap::new)
                .insert(col, cell);
        }
        Ok(())
    }

    fn make_cell(&mut self, field: &str, row: u32, col: u32) -> Option<Cell> {
        if field.is_empty() {
            return None;
        }
        if self.options.strings_to_numbers {
            if let Some(number) = parse_number(field) {
                return Some(Cell::Number(number));
            }
        }
        let text = if field.chars().count() > MAX_STRING_LEN {
            warn!(
                "text in {} is longer than {} characters, truncating",
                cell_reference(row, col),
                MAX_STRING_LEN
            );
            field.chars().take(MAX_STRING_LEN).collect()
        } else {
            field.to_string()
        };
        Some(Cell::Shared(self.shared.intern(text)))
    }

    /// Writes the package to disk and returns its path.
    pub fn close(self) -> Result<PathBuf, ConvertError> {
        if self.path.exists() {
            warn!("overwriting existing file {}", self.path.display());
        }
        let file = fs::File::create(&self.path).map_err(ConvertError::Io)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(CONTENT_TYPES.as_bytes())?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("xl/workbook.xml", options)?;
        self.write_workbook(&mut zip)?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(WORKBOOK_RELS.as_bytes())?;

        zip.start_file("xl/styles.xml", options)?;
        zip.write_all(STYLES.as_bytes())?;

        zip.start_file("xl/sharedStrings.xml", options)?;
        self.write_shared_strings(&mut zip)?;

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        write_sheet(&mut zip, &self.sheet)?;
        debug!("wrote sheet '{}' ({} rows)", self.sheet_name(), self.sheet.rows.len());

        zip.finish()?;
        Ok(self.path)
    }

    /// Drops the workbook without writing anything.
    pub fn discard(self) {
        debug!(
            "discarding workbook {}, nothing written",
            self.path.display()
        );
    }

    fn sheet_name(&self) -> &str {
        self.sheet.name.as_deref().unwrap_or(DEFAULT_SHEET_NAME)
    }

    fn write_workbook<W: Write>(&self, inner: W) -> Result<(), ConvertError> {
        let mut writer = Writer::new(inner);
        write_decl(&mut writer)?;

        let mut workbook = BytesStart::borrowed_name(b"workbook");
        workbook.push_attribute(("xmlns", MAIN_NS));
        workbook.push_attribute(("xmlns:r", REL_NS));
        writer.write_event(Event::Start(workbook))?;
        writer.write_event(Event::Start(BytesStart::borrowed_name(b"sheets")))?;

        let mut elem = BytesStart::borrowed_name(b"sheet");
        elem.push_attribute(("name", self.sheet_name()));
        elem.push_attribute(("sheetId", "1"));
        elem.push_attribute(("r:id", "rId1"));
        writer.write_event(Event::Empty(elem))?;

        writer.write_event(Event::End(BytesEnd::borrowed(b"sheets")))?;
        writer.write_event(Event::End(BytesEnd::borrowed(b"workbook")))?;
        Ok(())
    }

    fn write_shared_strings<W: Write>(&self, inner: W) -> Result<(), ConvertError> {
        let mut writer = Writer::new(inner);
        write_decl(&mut writer)?;

        let count = self.shared.references.to_string();
        let unique = self.shared.strings.len().to_string();
        let mut sst = BytesStart::borrowed_name(b"sst");
        sst.push_attribute(("xmlns", MAIN_NS));
        sst.push_attribute(("count", count.as_str()));
        sst.push_attribute(("uniqueCount", unique.as_str()));
        writer.write_event(Event::Start(sst))?;

        for text in self.shared.strings.iter() {
            writer.write_event(Event::Start(BytesStart::borrowed_name(b"si")))?;
            let mut t = BytesStart::borrowed_name(b"t");
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(t))?;
            let escaped = escape_excel_text(text);
            writer.write_event(Event::Text(BytesText::from_plain(escaped.as_bytes())))?;
            writer.write_event(Event::End(BytesEnd::borrowed(b"t")))?;
            writer.write_event(Event::End(BytesEnd::borrowed(b"si")))?;
        }

        writer.write_event(Event::End(BytesEnd::borrowed(b"sst")))?;
        Ok(())
    }
}

fn write_decl<W: Write>(writer: &mut Writer<W>) -> Result<(), ConvertError> {
    writer.write_event(Event::Decl(BytesDecl::new(
        b"1.0",
        Some(&b"UTF-8"[..]),
        Some(&b"yes"[..]),
    )))?;
    Ok(())
}

fn write_sheet<W: Write>(inner: W, sheet: &Sheet) -> Result<(), ConvertError> {
    let mut writer = Writer::new(inner);
    write_decl(&mut writer)?;

    let mut worksheet = BytesStart::borrowed_name(b"worksheet");
    worksheet.push_attribute(("xmlns", MAIN_NS));
    worksheet.push_attribute(("xmlns:r", REL_NS));
    writer.write_event(Event::Start(worksheet))?;

    let dimension = sheet_dimension(sheet);
    let mut elem = BytesStart::borrowed_name(b"dimension");
    elem.push_attribute(("ref", dimension.as_str()));
    writer.write_event(Event::Empty(elem))?;

    if sheet.rows.is_empty() {
        writer.write_event(Event::Empty(BytesStart::borrowed_name(b"sheetData")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::borrowed_name(b"sheetData")))?;
        for (row, cells) in sheet.rows.iter() {
            let row_number = (row + 1).to_string();
            let mut row_elem = BytesStart::borrowed_name(b"row");
            row_elem.push_attribute(("r", row_number.as_str()));
            writer.write_event(Event::Start(row_elem))?;

            for (col, cell) in cells.iter() {
                let reference = cell_reference(*row, *col);
                let mut c = BytesStart::borrowed_name(b"c");
                c.push_attribute(("r", reference.as_str()));
                let value = match cell {
                    Cell::Number(number) => number.to_string(),
                    Cell::Shared(idx) => {
                        c.push_attribute(("t", "s"));
                        idx.to_string()
                    }
                };
                writer.write_event(Event::Start(c))?;
                writer.write_event(Event::Start(BytesStart::borrowed_name(b"v")))?;
                writer.write_event(Event::Text(BytesText::from_plain(value.as_bytes())))?;
                writer.write_event(Event::End(BytesEnd::borrowed(b"v")))?;
                writer.write_event(Event::End(BytesEnd::borrowed(b"c")))?;
            }

            writer.write_event(Event::End(BytesEnd::borrowed(b"row")))?;
        }
        writer.write_event(Event::End(BytesEnd::borrowed(b"sheetData")))?;
    }

    writer.write_event(Event::End(BytesEnd::borrowed(b"worksheet")))?;
    Ok(())
}

fn sheet_dimension(sheet: &Sheet) -> String {
    let first_row = sheet.rows.keys().next();
    let last_row = sheet.rows.keys().next_back();
    let first_col = sheet.rows.values().filter_map(|r| r.keys().next()).min();
    let last_col = sheet.rows.values().filter_map(|r| r.keys().next_back()).max();
    match (first_row, last_row, first_col, last_col) {
        (Some(&r0), Some(&r1), Some(&c0), Some(&c1)) if (r0, c0) == (r1, c1) => {
            cell_reference(r0, c0)
        }
        (Some(&r0), Some(&r1), Some(&c0), Some(&c1)) => {
            format!("{}:{}", cell_reference(r0, c0), cell_reference(r1, c1))
        }
        _ => "A1".to_string(),
    }
}

/// Zero-based column index to its letters, `0` -> `A`, `26` -> `AA`.
pub fn column_name(col: u32) -> String {
    let mut name = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    name.into_iter().map(char::from).collect()
}

/// Zero-based (row, col) to an A1 reference.
pub fn cell_reference(row: u32, col: u32) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Finite numbers only; `nan` and `inf` stay text.
pub fn parse_number(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn validate_sheet_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("sheet name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err("sheet name is longer than 31 characters");
    }
    if name.contains(|c: char| matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\')) {
        return Err("sheet name contains one of []:*?/\\");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err("sheet name starts or ends with an apostrophe");
    }
    Ok(())
}

/// Control characters are not allowed in XML 1.0 text, Excel stores them
/// as `_xHHHH_`. Text that already looks like such an escape gets its
/// underscore escaped (`_x005F`) so Excel reads it back literally.
fn escape_excel_text(text: &str) -> Cow<'_, str> {
    let needs_escape = |c: char| c < ' ' && !matches!(c, '\t' | '\n');
    let text = ESCAPE_LOOKALIKE.replace_all(text, "_x005F$0");
    if !text.contains(needs_escape) {
        return text;
    }
    text.chars()
        .map(|c| {
            if needs_escape(c) {
                format!("_x{:04X}_", c as u32)
            } else {
                c.to_string()
            }
        })
        .collect::<String>()
        .into()
}
