//! Parse functions - turn a downloaded workbook into named datasets

use crate::ingestion::error::{LoadError, Result};
use crate::ingestion::types::{CellValue, Dataset, RawData, SheetCollection};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};
use std::collections::HashSet;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Text cells read as missing values
const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parse every sheet of a workbook, skipping `header_rows` rows above the header
pub fn parse_workbook(raw: RawData, header_rows: usize) -> Result<SheetCollection> {
    info!("Parsing workbook from {} ({} bytes)", raw.source, raw.len());

    if raw.is_empty() {
        return Err(LoadError::Format(calamine::Error::Msg(
            "downloaded file is empty",
        )));
    }

    let cursor = Cursor::new(raw.bytes);
    let mut workbook = open_workbook_auto_from_rs(cursor)?;

    let mut sheets = SheetCollection::new();

    for sheet_name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&sheet_name)?;
        let dataset = sheet_to_dataset(&range, header_rows);

        debug!(
            "Sheet '{}': {} rows x {} columns",
            sheet_name,
            dataset.height(),
            dataset.width()
        );

        if !sheets.insert(sheet_name.clone(), dataset) {
            warn!("Duplicate sheet name '{}' ignored", sheet_name);
        }
    }

    info!("Extracted data from workbook: {:?}", sheets.names());

    Ok(sheets)
}

/// Convert one sheet, addressing rows and columns from A1
fn sheet_to_dataset(range: &Range<Data>, header_rows: usize) -> Dataset {
    let (end_row, end_col) = match range.end() {
        Some(end) if !range.is_empty() => end,
        _ => return Dataset::default(),
    };

    if header_rows > end_row as usize {
        return Dataset::default();
    }
    let header_row = header_rows as u32;

    let cell_at = |row: u32, col: u32| -> CellValue {
        range
            .get_value((row, col))
            .map(convert_cell)
            .unwrap_or(CellValue::Missing)
    };

    let raw_names: Vec<String> = (0..=end_col)
        .map(|col| match cell_at(header_row, col) {
            CellValue::Missing => format!("Unnamed: {}", col),
            value => value.to_string(),
        })
        .collect();
    let header = dedupe_names(raw_names);

    let mut rows: Vec<Vec<CellValue>> = ((header_row + 1)..=end_row)
        .map(|row| (0..=end_col).map(|col| cell_at(row, col)).collect())
        .collect();

    // Trailing blank rows are formatting leftovers, not data
    while rows
        .last()
        .map(|row: &Vec<CellValue>| row.iter().all(CellValue::is_missing))
        .unwrap_or(false)
    {
        rows.pop();
    }

    Dataset::from_rows(header, rows)
}

/// Convert a calamine cell into a pipeline value
fn convert_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Missing,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => float_cell(*f),
        Data::String(s) => {
            if NA_MARKERS.contains(&s.as_str()) {
                CellValue::Missing
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(data.to_string())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        // #DIV/0!, #REF!, #N/A and friends carry no value
        Data::Error(_) => CellValue::Missing,
    }
}

/// Workbooks store every number as a double; whole numbers read back as integers
fn float_cell(value: f64) -> CellValue {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63

    if value.is_finite() && value.fract() == 0.0 && value.abs() < I64_BOUND {
        CellValue::Int(value as i64)
    } else {
        CellValue::Float(value)
    }
}

/// Make header names unique: `a, a, a` -> `a, a.1, a.2`
fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(names.len());

    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 0;
        while taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", name, suffix);
        }
        taken.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    fn write_preamble(sheet: &mut Worksheet) {
        sheet.write_string(0, 0, "Monthly sales report").unwrap();
        sheet.write_string(1, 0, "Generated by finance").unwrap();
        sheet.write_string(5, 1, "Confidential").unwrap();
    }

    fn sales_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();

        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Jan").unwrap();
            write_preamble(sheet);
            sheet.write_string(7, 0, "region").unwrap();
            sheet.write_string(7, 1, "units").unwrap();
            sheet.write_string(7, 2, "margin").unwrap();
            sheet.write_string(8, 0, "north").unwrap();
            sheet.write_number(8, 1, 12.0).unwrap();
            sheet.write_number(8, 2, 0.4567).unwrap();
            sheet.write_string(9, 0, "south").unwrap();
            sheet.write_number(9, 1, 7.0).unwrap();
            sheet.write_number(9, 2, 0.05).unwrap();
        }

        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Feb").unwrap();
            write_preamble(sheet);
            sheet.write_string(7, 0, "region").unwrap();
            sheet.write_string(7, 1, "units").unwrap();
            sheet.write_string(8, 0, "east").unwrap();
            sheet.write_string(8, 1, "N/A").unwrap();
        }

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_parse_all_sheets_in_order() {
        let raw = RawData::new("memory", sales_workbook());

        let sheets = parse_workbook(raw, 7).unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets.names(), vec!["Jan", "Feb"]);
    }

    #[test]
    fn test_parse_skips_preamble_and_reads_header() {
        let raw = RawData::new("memory", sales_workbook());

        let sheets = parse_workbook(raw, 7).unwrap();
        let jan = sheets.get("Jan").unwrap();

        assert_eq!(jan.column_names(), vec!["region", "units", "margin"]);
        assert_eq!(jan.height(), 2);
        assert_eq!(jan.columns[0].values[0], CellValue::text("north"));
        assert_eq!(jan.columns[1].values[0], CellValue::Int(12));
        assert_eq!(jan.columns[2].values[0], CellValue::Float(0.4567));
    }

    #[test]
    fn test_parse_na_markers_become_missing() {
        let raw = RawData::new("memory", sales_workbook());

        let sheets = parse_workbook(raw, 7).unwrap();
        let feb = sheets.get("Feb").unwrap();

        assert_eq!(feb.columns[1].values[0], CellValue::Missing);
    }

    #[test]
    fn test_parse_header_not_at_range_start() {
        // No preamble content: the used range begins at the header row
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.write_string(7, 1, "name").unwrap();
            sheet.write_string(7, 2, "name").unwrap();
            sheet.write_string(8, 1, "alice").unwrap();
            sheet.write_string(8, 2, "smith").unwrap();
        }
        let raw = RawData::new("memory", workbook.save_to_buffer().unwrap());

        let sheets = parse_workbook(raw, 7).unwrap();
        let dataset = sheets.get("Sheet1").unwrap();

        assert_eq!(dataset.column_names(), vec!["Unnamed: 0", "name", "name.1"]);
        assert_eq!(dataset.height(), 1);
        assert_eq!(dataset.columns[0].values[0], CellValue::Missing);
        assert_eq!(dataset.columns[2].values[0], CellValue::text("smith"));
    }

    #[test]
    fn test_parse_blank_rows_inside_kept_trailing_dropped() {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            let blank = Format::new().set_bold();
            sheet.write_string(7, 0, "region").unwrap();
            sheet.write_string(7, 1, "units").unwrap();
            sheet.write_string(8, 0, "north").unwrap();
            sheet.write_number(8, 1, 12.0).unwrap();
            // row 9 left empty between the data rows
            sheet.write_string(10, 0, "south").unwrap();
            sheet.write_number(10, 1, 7.0).unwrap();
            // formatted but empty cells stretch the used range below the data
            sheet.write_blank(12, 0, &blank).unwrap();
            sheet.write_blank(14, 1, &blank).unwrap();
        }
        let raw = RawData::new("memory", workbook.save_to_buffer().unwrap());

        let sheets = parse_workbook(raw, 7).unwrap();
        let dataset = sheets.get("Sheet1").unwrap();

        assert_eq!(dataset.height(), 3);
        assert_eq!(
            dataset.column("region").unwrap().values,
            vec![
                CellValue::text("north"),
                CellValue::Missing,
                CellValue::text("south")
            ]
        );
        assert_eq!(dataset.column("units").unwrap().values[1], CellValue::Missing);
    }

    #[test]
    fn test_sheet_to_dataset_trims_only_trailing_blank_rows() {
        let mut range: Range<Data> = Range::new((0, 0), (6, 1));
        range.set_value((1, 0), Data::String("region".to_string()));
        range.set_value((1, 1), Data::String("units".to_string()));
        range.set_value((2, 0), Data::String("north".to_string()));
        range.set_value((2, 1), Data::Float(12.0));
        range.set_value((4, 0), Data::String("south".to_string()));
        range.set_value((4, 1), Data::Float(7.0));
        range.set_value((6, 1), Data::String("n/a".to_string()));

        let dataset = sheet_to_dataset(&range, 1);

        assert_eq!(dataset.height(), 3);
        assert!(dataset.row(1).iter().all(|cell| cell.is_missing()));
        assert_eq!(dataset.columns[1].values[2], CellValue::Int(7));
    }

    #[test]
    fn test_error_cells_become_missing() {
        for error in [
            CellErrorType::Div0,
            CellErrorType::NA,
            CellErrorType::Name,
            CellErrorType::Null,
            CellErrorType::Num,
            CellErrorType::Ref,
            CellErrorType::Value,
        ] {
            assert_eq!(convert_cell(&Data::Error(error)), CellValue::Missing);
        }
    }

    #[test]
    fn test_parse_short_sheet_is_empty() {
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.write_string(2, 0, "only a title").unwrap();
        }
        let raw = RawData::new("memory", workbook.save_to_buffer().unwrap());

        let sheets = parse_workbook(raw, 7).unwrap();

        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets.get("Sheet1").unwrap().width(), 0);
    }

    #[test]
    fn test_parse_invalid_bytes() {
        let raw = RawData::new("memory", b"this is not a spreadsheet".to_vec());

        let result = parse_workbook(raw, 7);

        assert!(matches!(result, Err(LoadError::Format(_))));
    }

    #[test]
    fn test_parse_empty_download() {
        let raw = RawData::new("memory", Vec::new());

        assert!(matches!(parse_workbook(raw, 7), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_float_cell() {
        assert_eq!(float_cell(3.0), CellValue::Int(3));
        assert_eq!(float_cell(0.25), CellValue::Float(0.25));
        assert!(matches!(float_cell(f64::INFINITY), CellValue::Float(_)));
    }

    #[test]
    fn test_dedupe_names() {
        let names = vec!["a", "a", "a.1", "b", "a"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(dedupe_names(names), vec!["a", "a.1", "a.1.1", "b", "a.2"]);
    }
}
