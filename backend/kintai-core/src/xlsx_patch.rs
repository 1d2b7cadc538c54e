// src/xlsx_patch.rs

//! In-place edits of an `.xlsx` package.
//!
//! Only the worksheet XML being edited is rewritten. Every other ZIP entry is
//! copied raw, so styles, merged cells, drawings and macros survive untouched.

use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read, Seek, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const CALC_CHAIN_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("read error: {0}")]
    Calamine(#[from] calamine::XlsxError),
    #[error("part not found in package: {0}")]
    MissingPart(String),
    #[error("workbook has no worksheets")]
    NoWorksheets,
    #[error("invalid cell reference in worksheet xml: {0}")]
    InvalidCellRef(String),
    #[error("worksheet xml ended inside <{0}>")]
    Truncated(&'static str),
    #[error("cell {0} anchors a shared formula used by other cells")]
    SharedFormulaMaster(String),
}

// --- Patch Description ---

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Text(String),
    Number(f64),
}

/// One cell of the patched row, by 1-based column.
#[derive(Debug, Clone, PartialEq)]
pub struct CellPatch {
    pub col: u32,
    pub value: PatchValue,
}

impl CellPatch {
    pub fn text(col: u32, text: impl Into<String>) -> Self {
        Self {
            col,
            value: PatchValue::Text(text.into()),
        }
    }

    pub fn number(col: u32, n: f64) -> Self {
        Self {
            col,
            value: PatchValue::Number(n),
        }
    }
}

/// The worksheet a workbook opens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub name: String,
    /// ZIP entry, e.g. `xl/worksheets/sheet1.xml`.
    pub part: String,
}

// --- Cell References ---

pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

fn cell_ref(col: u32, row: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// Column of an `A1` style reference.
fn parse_ref_column(r: &str) -> Option<u32> {
    let letters: String = r.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    Some(
        letters
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1)),
    )
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

fn element_prefix(name: &[u8]) -> Option<String> {
    name.iter()
        .rposition(|b| *b == b':')
        .and_then(|idx| std::str::from_utf8(&name[..idx]).ok())
        .map(str::to_string)
}

fn prefixed(prefix: &Option<String>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, WorkbookError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

// --- Package Access ---

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, WorkbookError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(WorkbookError::MissingPart(name.to_string()))
        }
        Err(err) => return Err(err.into()),
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Resolves the sheet selected by `workbookView@activeTab` (first sheet when
/// absent or out of range) to its name and worksheet part.
pub fn active_sheet(package: &[u8]) -> Result<SheetTarget, WorkbookError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;

    let mut reader = Reader::from_reader(workbook_xml.as_slice());
    let mut buf = Vec::new();
    let mut active_tab = 0usize;
    let mut sheets: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) => match local_name(e.name().as_ref()) {
                b"workbookView" => {
                    if let Some(tab) = attr_value(e, b"activeTab")? {
                        active_tab = tab.trim().parse().unwrap_or(0);
                    }
                }
                b"sheet" => {
                    let mut name = None;
                    let mut rel_id = None;
                    for attr in e.attributes() {
                        let attr = attr?;
                        let key = attr.key.as_ref();
                        if key == b"name" {
                            name = Some(attr.unescape_value()?.into_owned());
                        } else if key != b"id" && local_name(key) == b"id" {
                            rel_id = Some(attr.unescape_value()?.into_owned());
                        }
                    }
                    if let (Some(name), Some(rel_id)) = (name, rel_id) {
                        sheets.push((name, rel_id));
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    let (name, rel_id) = sheets
        .get(active_tab)
        .or_else(|| sheets.first())
        .cloned()
        .ok_or(WorkbookError::NoWorksheets)?;

    let target = relationship_target(&rels_xml, &rel_id)?
        .ok_or_else(|| WorkbookError::MissingPart(format!("relationship {}", rel_id)))?;

    Ok(SheetTarget {
        name,
        part: resolve_target(&target),
    })
}

fn relationship_target(rels_xml: &[u8], rel_id: &str) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_reader(rels_xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => return Ok(None),
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                if attr_value(e, b"Id")?.as_deref() == Some(rel_id) {
                    return attr_value(e, b"Target");
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Workbook relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = vec!["xl"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

// --- Row Patch ---

/// Rewrites `row` of the worksheet at `part` with the given cells and returns
/// the new package bytes. The workbook is flagged to recalculate on load.
pub fn patch_row(
    package: &[u8],
    part: &str,
    row: u32,
    cells: &[CellPatch],
) -> Result<Vec<u8>, WorkbookError> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let sheet_xml = read_part(&mut archive, part)?;
    let (patched_sheet, replaced_formula) = patch_worksheet_row(&sheet_xml, row, cells)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(package.len() + 1024)));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();

        if name == part {
            zip.start_file(name, options)?;
            zip.write_all(&patched_sheet)?;
        } else if name == WORKBOOK_PART {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            zip.start_file(name, options)?;
            zip.write_all(&workbook_force_full_calc(&buf)?)?;
        } else if replaced_formula && name == CALC_CHAIN_PART {
            continue;
        } else if replaced_formula && (name == WORKBOOK_RELS_PART || name == CONTENT_TYPES_PART) {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            let updated = if name == WORKBOOK_RELS_PART {
                remove_matching(&buf, b"Relationship", is_calc_chain_relationship)?
            } else {
                remove_matching(&buf, b"Override", is_calc_chain_override)?
            };
            zip.start_file(name, options)?;
            zip.write_all(&updated)?;
        } else {
            zip.raw_copy_file(file)?;
        }
    }

    Ok(zip.finish()?.into_inner())
}

struct RowPlan<'a> {
    row: u32,
    cells: Vec<&'a CellPatch>,
    next: usize,
    written: bool,
    replaced_formula: bool,
}

impl<'a> RowPlan<'a> {
    fn new(row: u32, cells: &'a [CellPatch]) -> Self {
        // Last patch for a column wins.
        let by_col: BTreeMap<u32, &CellPatch> = cells.iter().map(|c| (c.col, c)).collect();
        Self {
            row,
            cells: by_col.into_values().collect(),
            next: 0,
            written: false,
            replaced_formula: false,
        }
    }

    fn write_pending_before<W: Write>(
        &mut self,
        writer: &mut Writer<W>,
        prefix: &Option<String>,
        col: Option<u32>,
    ) -> Result<(), WorkbookError> {
        while let Some(patch) = self.cells.get(self.next) {
            if col.is_some_and(|c| patch.col >= c) {
                break;
            }
            write_cell(writer, prefix, self.row, patch, None)?;
            self.next += 1;
        }
        Ok(())
    }

    fn take(&mut self, col: u32) -> Option<&'a CellPatch> {
        let patch = *self.cells.get(self.next)?;
        if patch.col == col {
            self.next += 1;
            Some(patch)
        } else {
            None
        }
    }

    fn write_new_row<W: Write>(
        &mut self,
        writer: &mut Writer<W>,
        prefix: &Option<String>,
    ) -> Result<(), WorkbookError> {
        let row_tag = prefixed(prefix, "row");
        let mut start = BytesStart::new(row_tag.as_str());
        start.push_attribute(("r", self.row.to_string().as_str()));
        writer.write_event(Event::Start(start))?;
        self.write_pending_before(writer, prefix, None)?;
        writer.write_event(Event::End(BytesEnd::new(row_tag.as_str())))?;
        self.written = true;
        Ok(())
    }
}

fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    prefix: &Option<String>,
    row: u32,
    patch: &CellPatch,
    style: Option<&str>,
) -> Result<(), WorkbookError> {
    let c_tag = prefixed(prefix, "c");
    let mut c = BytesStart::new(c_tag.as_str());
    c.push_attribute(("r", cell_ref(patch.col, row).as_str()));
    if let Some(s) = style {
        c.push_attribute(("s", s));
    }

    match &patch.value {
        PatchValue::Text(text) => {
            c.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(c))?;
            let is_tag = prefixed(prefix, "is");
            let t_tag = prefixed(prefix, "t");
            let mut t = BytesStart::new(t_tag.as_str());
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.push_attribute(("xml:space", "preserve"));
            }
            writer.write_event(Event::Start(BytesStart::new(is_tag.as_str())))?;
            writer.write_event(Event::Start(t))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(t_tag.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(is_tag.as_str())))?;
        }
        PatchValue::Number(n) => {
            writer.write_event(Event::Start(c))?;
            let v_tag = prefixed(prefix, "v");
            writer.write_event(Event::Start(BytesStart::new(v_tag.as_str())))?;
            writer.write_event(Event::Text(BytesText::new(&n.to_string())))?;
            writer.write_event(Event::End(BytesEnd::new(v_tag.as_str())))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(c_tag.as_str())))?;
    Ok(())
}

/// Copy of a `<row>` start tag without `spans`, which may no longer cover the
/// row's cells.
fn row_start_without_spans(e: &BytesStart<'_>) -> Result<BytesStart<'static>, WorkbookError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut start = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"spans" {
            continue;
        }
        start.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    Ok(start)
}

/// Formula found in a skipped `<c>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellFormula {
    None,
    Plain,
    /// `<f t="shared" ref=...>`, the cell other cells take their formula from.
    SharedMaster,
}

fn formula_kind(e: &BytesStart<'_>) -> Result<CellFormula, WorkbookError> {
    let shared = attr_value(e, b"t")?.as_deref() == Some("shared");
    if shared && attr_value(e, b"ref")?.is_some() {
        Ok(CellFormula::SharedMaster)
    } else {
        Ok(CellFormula::Plain)
    }
}

/// Consumes the rest of a `<c>` element and reports its formula, if any.
fn skip_cell<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
) -> Result<CellFormula, WorkbookError> {
    let mut depth = 1usize;
    let mut formula = CellFormula::None;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(ref e) => {
                if local_name(e.name().as_ref()) == b"f" {
                    formula = formula_kind(e)?;
                }
                depth += 1;
            }
            Event::Empty(ref e) => {
                if local_name(e.name().as_ref()) == b"f" {
                    formula = formula_kind(e)?;
                }
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(formula);
                }
            }
            Event::Eof => return Err(WorkbookError::Truncated("c")),
            _ => {}
        }
    }
}

fn row_number(e: &BytesStart<'_>, previous: u32) -> Result<u32, WorkbookError> {
    match attr_value(e, b"r")? {
        Some(r) => r
            .trim()
            .parse()
            .map_err(|_| WorkbookError::InvalidCellRef(r)),
        None => Ok(previous + 1),
    }
}

fn cell_column(e: &BytesStart<'_>, previous: u32) -> Result<u32, WorkbookError> {
    match attr_value(e, b"r")? {
        Some(r) => parse_ref_column(&r).ok_or(WorkbookError::InvalidCellRef(r)),
        None => Ok(previous + 1),
    }
}

/// Returns the patched worksheet XML and whether a replaced cell held a formula.
pub(crate) fn patch_worksheet_row(
    sheet_xml: &[u8],
    row: u32,
    cells: &[CellPatch],
) -> Result<(Vec<u8>, bool), WorkbookError> {
    let mut plan = RowPlan::new(row, cells);

    let mut reader = Reader::from_reader(sheet_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(sheet_xml.len() + 512));

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut prefix: Option<String> = None;
    let mut in_sheet_data = false;
    let mut in_target_row = false;
    let mut last_row = 0u32;
    let mut last_col = 0u32;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,

            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                prefix = element_prefix(e.name().as_ref());
                in_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sheetData" => {
                prefix = element_prefix(e.name().as_ref());
                let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::Start(e.to_owned()))?;
                plan.write_new_row(&mut writer, &prefix)?;
                writer.write_event(Event::End(BytesEnd::new(tag)))?;
            }
            Event::End(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"sheetData" => {
                if !plan.written {
                    plan.write_new_row(&mut writer, &prefix)?;
                }
                in_sheet_data = false;
                writer.write_event(Event::End(e.to_owned()))?;
            }

            Event::Start(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let r = row_number(e, last_row)?;
                last_row = r;
                last_col = 0;
                if !plan.written && r > row {
                    plan.write_new_row(&mut writer, &prefix)?;
                }
                if r == row && !plan.written {
                    in_target_row = true;
                    writer.write_event(Event::Start(row_start_without_spans(e)?))?;
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if in_sheet_data && local_name(e.name().as_ref()) == b"row" => {
                let r = row_number(e, last_row)?;
                last_row = r;
                if !plan.written && r > row {
                    plan.write_new_row(&mut writer, &prefix)?;
                }
                if r == row && !plan.written {
                    let start = row_start_without_spans(e)?;
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(start))?;
                    plan.write_pending_before(&mut writer, &prefix, None)?;
                    writer.write_event(Event::End(BytesEnd::new(tag)))?;
                    plan.written = true;
                } else {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::End(ref e) if in_target_row && local_name(e.name().as_ref()) == b"row" => {
                plan.write_pending_before(&mut writer, &prefix, None)?;
                in_target_row = false;
                plan.written = true;
                writer.write_event(Event::End(e.to_owned()))?;
            }

            Event::Start(ref e) if in_target_row && local_name(e.name().as_ref()) == b"c" => {
                let col = cell_column(e, last_col)?;
                last_col = col;
                plan.write_pending_before(&mut writer, &prefix, Some(col))?;
                if let Some(patch) = plan.take(col) {
                    let style = attr_value(e, b"s")?;
                    match skip_cell(&mut reader, &mut skip_buf)? {
                        CellFormula::None => {}
                        CellFormula::Plain => plan.replaced_formula = true,
                        CellFormula::SharedMaster => {
                            return Err(WorkbookError::SharedFormulaMaster(cell_ref(col, row)));
                        }
                    }
                    write_cell(&mut writer, &prefix, row, patch, style.as_deref())?;
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if in_target_row && local_name(e.name().as_ref()) == b"c" => {
                let col = cell_column(e, last_col)?;
                last_col = col;
                plan.write_pending_before(&mut writer, &prefix, Some(col))?;
                if let Some(patch) = plan.take(col) {
                    let style = attr_value(e, b"s")?;
                    write_cell(&mut writer, &prefix, row, patch, style.as_deref())?;
                } else {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }

            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !plan.written {
        return Err(WorkbookError::MissingPart("worksheet <sheetData>".to_string()));
    }
    Ok((writer.into_inner(), plan.replaced_formula))
}

// --- Recalculation ---

/// `CT_Workbook` children that come after `calcPr`.
const AFTER_CALC_PR: [&[u8]; 9] = [
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

fn new_calc_pr(prefix: &Option<String>) -> BytesStart<'static> {
    let mut calc_pr = BytesStart::new(prefixed(prefix, "calcPr"));
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    calc_pr
}

/// Sets `calcPr@fullCalcOnLoad="1"`, adding `<calcPr/>` at its schema
/// position when missing, so formulas depending on the patched cells refresh
/// when the file is opened.
fn workbook_force_full_calc(workbook_xml: &[u8]) -> Result<Vec<u8>, WorkbookError> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len() + 64));

    let mut buf = Vec::new();
    let mut saw_calc_pr = false;
    let mut prefix: Option<String> = None;
    // 1 while directly inside <workbook>.
    let mut depth = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"calcPr" => {
                saw_calc_pr = true;
                writer.write_event(Event::Empty(calc_pr_with_full_calc(e)?))?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"calcPr" => {
                saw_calc_pr = true;
                depth += 1;
                writer.write_event(Event::Start(calc_pr_with_full_calc(e)?))?;
            }
            Event::Start(ref e) | Event::Empty(ref e) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if depth == 0 && name == b"workbook" {
                    prefix = element_prefix(qname.as_ref());
                }
                if depth == 1 && !saw_calc_pr && AFTER_CALC_PR.iter().any(|n| *n == name) {
                    saw_calc_pr = true;
                    writer.write_event(Event::Empty(new_calc_pr(&prefix)))?;
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event.borrow())?;
            }
            Event::End(ref e) => {
                if depth == 1 && !saw_calc_pr && local_name(e.name().as_ref()) == b"workbook" {
                    saw_calc_pr = true;
                    writer.write_event(Event::Empty(new_calc_pr(&prefix)))?;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e.to_owned()))?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn calc_pr_with_full_calc(e: &BytesStart<'_>) -> Result<BytesStart<'static>, WorkbookError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut calc_pr = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"fullCalcOnLoad" {
            continue;
        }
        calc_pr.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    Ok(calc_pr)
}

fn is_calc_chain_relationship(e: &BytesStart<'_>) -> Result<bool, WorkbookError> {
    if attr_value(e, b"Type")?.as_deref() == Some(CALC_CHAIN_REL_TYPE) {
        return Ok(true);
    }
    Ok(attr_value(e, b"Target")?.is_some_and(|t| t.ends_with("calcChain.xml")))
}

fn is_calc_chain_override(e: &BytesStart<'_>) -> Result<bool, WorkbookError> {
    Ok(attr_value(e, b"PartName")?.is_some_and(|p| p.ends_with("calcChain.xml")))
}

/// Drops every `element` for which `matches` holds, including its children.
fn remove_matching(
    xml: &[u8],
    element: &[u8],
    matches: fn(&BytesStart<'_>) -> Result<bool, WorkbookError>,
) -> Result<Vec<u8>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    let mut buf = Vec::new();
    let mut skipping = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) if local_name(e.name().as_ref()) == element => {
                if matches(e)? {
                    skipping = true;
                } else {
                    writer.write_event(Event::Start(e.to_owned()))?;
                }
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == element => {
                if !matches(e)? {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                }
            }
            Event::End(ref e) if skipping && local_name(e.name().as_ref()) == element => {
                skipping = false;
            }
            _ if skipping => {}
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}
