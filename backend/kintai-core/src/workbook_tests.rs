// src/workbook_tests.rs

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use chrono::NaiveDate;
    use rust_xlsxwriter::{Format, Workbook, Worksheet};
    use tempfile::TempDir;

    use super::super::config::AppConfig;
    use super::super::error::AttendanceError;
    use super::super::row_locator::{
        CellValue, COL_END, COL_OVERTIME, COL_REMARK, COL_SHIFT_LABEL, COL_START,
    };
    use super::super::time_utils::{serial_to_minutes, time_to_serial};
    use super::super::workbook::{read_cell, RowData, StartCell, TimesheetStore, XlsxTimesheetStore};

    // rust_xlsxwriter is 0-based, the store is 1-based.
    fn fill_template(sheet: &mut Worksheet) {
        let time = Format::new().set_num_format("hh:mm");
        sheet.write_string(4, 1, "山田").unwrap();
        sheet.write_string(16, 2, "日").unwrap();
        for day in 1..=28u32 {
            sheet.write_number(16 + day, 2, f64::from(day)).unwrap();
        }
        // Day 3 already clocked in at 09:45.
        sheet
            .write_number_with_format(19, 5, time_to_serial(9, 45), &time)
            .unwrap();
        // Day 5 end time is derived from its start.
        sheet.write_formula(21, 6, "=F22+TIME(9,0,0)").unwrap();
    }

    fn template(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("2月").unwrap();
        fill_template(sheet);
        workbook.save(&path).unwrap();
        path
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn minutes(value: CellValue) -> i64 {
        match value {
            CellValue::Number(n) => serial_to_minutes(n),
            other => panic!("expected a number, got {:?}", other),
        }
    }

    #[test]
    fn test_clock_in_row_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202602山田.xlsx");
        let store = XlsxTimesheetStore::new();

        let row = RowData {
            shift_label: Some("日勤".into()),
            start_time: Some(time_to_serial(10, 0)),
            ..RowData::new(date(10))
        };
        store.write_row(&path, &row).unwrap();

        // Day 10 sits on row 27.
        assert_eq!(
            read_cell(&path, 27, COL_SHIFT_LABEL).unwrap(),
            CellValue::Text("日勤".into())
        );
        assert_eq!(minutes(read_cell(&path, 27, COL_START).unwrap()), 600);
        assert_eq!(read_cell(&path, 27, COL_END).unwrap(), CellValue::Empty);
        assert_eq!(
            store.read_start_time(&path, date(10)).unwrap(),
            StartCell::Serial(time_to_serial(10, 0))
        );
    }

    #[test]
    fn test_partial_write_keeps_other_cells() {
        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202602山田.xlsx");
        let store = XlsxTimesheetStore::new();

        let row = RowData {
            end_time: Some(time_to_serial(20, 0)),
            overtime_type: Some("客先指示".into()),
            remark: Some("リリース対応".into()),
            ..RowData::new(date(3))
        };
        store.write_row(&path, &row).unwrap();

        assert_eq!(minutes(read_cell(&path, 20, COL_START).unwrap()), 9 * 60 + 45);
        assert_eq!(minutes(read_cell(&path, 20, COL_END).unwrap()), 20 * 60);
        assert_eq!(
            read_cell(&path, 20, COL_OVERTIME).unwrap(),
            CellValue::Text("客先指示".into())
        );
        assert_eq!(
            read_cell(&path, 20, COL_REMARK).unwrap(),
            CellValue::Text("リリース対応".into())
        );
        assert_eq!(read_cell(&path, 5, 2).unwrap(), CellValue::Text("山田".into()));
        assert_eq!(read_cell(&path, 17, 3).unwrap(), CellValue::Text("日".into()));
    }

    #[test]
    fn test_start_cell_states() {
        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202602山田.xlsx");
        let store = XlsxTimesheetStore::new();

        assert_eq!(store.read_start_time(&path, date(4)).unwrap(), StartCell::Blank);

        let row = RowData {
            start_time: None,
            shift_label: Some("シフト休".into()),
            remark: Some("-".into()),
            ..RowData::new(date(4))
        };
        store.write_row(&path, &row).unwrap();
        assert_eq!(store.read_start_time(&path, date(4)).unwrap(), StartCell::Blank);

        match store.read_start_time(&path, date(3)).unwrap() {
            StartCell::Serial(s) => assert_eq!(serial_to_minutes(s), 9 * 60 + 45),
            other => panic!("expected a serial, got {:?}", other),
        }
    }

    #[test]
    fn test_formula_cell_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202602山田.xlsx");
        let store = XlsxTimesheetStore::new();

        let row = RowData {
            end_time: Some(time_to_serial(18, 30)),
            ..RowData::new(date(5))
        };
        store.write_row(&path, &row).unwrap();
        assert_eq!(minutes(read_cell(&path, 22, COL_END).unwrap()), 18 * 60 + 30);
    }

    #[test]
    fn test_month_end_rows_follow_day_28() {
        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202601山田.xlsx");
        let store = XlsxTimesheetStore::new();

        let row = RowData {
            shift_label: Some("早番".into()),
            ..RowData::new(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
        };
        store.write_row(&path, &row).unwrap();
        assert_eq!(
            read_cell(&path, 48, COL_SHIFT_LABEL).unwrap(),
            CellValue::Text("早番".into())
        );
    }

    #[test]
    fn test_unrecognized_row_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("202602山田.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "勤務表").unwrap();
        workbook.save(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let store = XlsxTimesheetStore::new();
        let row = RowData {
            shift_label: Some("日勤".into()),
            ..RowData::new(date(10))
        };
        let err = store.write_row(&path, &row).unwrap_err();
        assert!(matches!(
            err,
            AttendanceError::RowNotRecognized { month: 2, day: 10, .. }
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(matches!(
            store.read_start_time(&path, date(10)),
            Err(AttendanceError::RowNotRecognized { .. })
        ));
    }

    #[test]
    fn test_writes_go_to_the_active_sheet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("202602山田.xlsx");
        let mut workbook = Workbook::new();
        let first = workbook.add_worksheet();
        first.set_name("1月").unwrap();
        fill_template(first);
        let second = workbook.add_worksheet();
        second.set_name("2月").unwrap();
        fill_template(second);
        second.set_active(true);
        workbook.save(&path).unwrap();

        let store = XlsxTimesheetStore::new();
        let row = RowData {
            shift_label: Some("遅番".into()),
            ..RowData::new(date(1))
        };
        store.write_row(&path, &row).unwrap();

        assert_eq!(
            read_cell(&path, 18, COL_SHIFT_LABEL).unwrap(),
            CellValue::Text("遅番".into())
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = template(dir.path(), "202602山田.xlsx");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();

        let row = RowData {
            shift_label: Some("日勤".into()),
            ..RowData::new(date(10))
        };
        XlsxTimesheetStore::new().write_row(&path, &row).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[test]
    fn test_shared_formula_master_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("202602山田.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        fill_template(sheet);
        // Filled-down end times: G18 holds the master, G19 and G20 refer to it.
        sheet
            .write_formula(17, 6, "=F18+TIME(9,0,0)")
            .unwrap()
            .write_formula(18, 6, "=F19+TIME(9,0,0)")
            .unwrap();
        workbook.save(&path).unwrap();
        share_column_formula(&path);
        let before = fs::read(&path).unwrap();

        let row = RowData {
            end_time: Some(time_to_serial(19, 0)),
            ..RowData::new(date(1))
        };
        let err = XlsxTimesheetStore::new().write_row(&path, &row).unwrap_err();
        assert!(matches!(err, AttendanceError::TimesheetWrite(ref m) if m.contains("G18")));
        assert_eq!(fs::read(&path).unwrap(), before);

        // Dependent cells can still be written.
        let row = RowData {
            end_time: Some(time_to_serial(19, 0)),
            ..RowData::new(date(2))
        };
        XlsxTimesheetStore::new().write_row(&path, &row).unwrap();
        assert_eq!(minutes(read_cell(&path, 19, COL_END).unwrap()), 19 * 60);
    }

    /// Rewrites the G18/G19 formulas as one shared formula anchored on G18.
    fn share_column_formula(path: &Path) {
        use std::io::{Read, Write};

        let bytes = fs::read(path).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut out = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let name = file.name().to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            if name == "xl/worksheets/sheet1.xml" {
                let xml = String::from_utf8(content).unwrap();
                let xml = xml
                    .replace(
                        "<f>F18+TIME(9,0,0)</f>",
                        "<f t=\"shared\" ref=\"G18:G19\" si=\"0\">F18+TIME(9,0,0)</f>",
                    )
                    .replace("<f>F19+TIME(9,0,0)</f>", "<f t=\"shared\" si=\"0\"/>");
                assert!(xml.contains("ref=\"G18:G19\""));
                content = xml.into_bytes();
            }
            out.start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            out.write_all(&content).unwrap();
        }
        fs::write(path, out.finish().unwrap().into_inner()).unwrap();
    }

    #[test]
    fn test_missing_file_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        let store = XlsxTimesheetStore::new();
        let row = RowData {
            shift_label: Some("日勤".into()),
            ..RowData::new(date(10))
        };
        let err = store
            .write_row(&dir.path().join("202602山田.xlsx"), &row)
            .unwrap_err();
        assert!(matches!(err, AttendanceError::TimesheetWrite(_)));
    }

    #[test]
    fn test_locate_uses_configured_folder() {
        let dir = TempDir::new().unwrap();
        let expected = template(dir.path(), "勤務表_202602_山田.xlsx");
        template(dir.path(), "勤務表_202603_山田.xlsx");
        let config = AppConfig {
            timesheet_folder: dir.path().to_string_lossy().into_owned(),
            display_name: "山田".into(),
            ..AppConfig::default()
        };

        let store = XlsxTimesheetStore::new();
        assert_eq!(store.locate(&config, date(10)).unwrap(), expected);
        assert!(matches!(
            store.locate(&config, NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()),
            Err(AttendanceError::TimesheetNotFound { .. })
        ));
    }
}
