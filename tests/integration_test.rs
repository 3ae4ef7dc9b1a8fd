//! Integration tests for excelsplit

use excelsplit::types::CellValue;
use excelsplit::{
    analyze_workbook, list_sheets, spawn_analysis, spawn_split, split_workbook, EngineConfig,
    ErrorKind, ExcelError, ExcelReader, ExcelWriter, GroupKey, ProgressEvent, ProgressReporter,
    SplitRequest, TaskEvent, WorkbookAnalysis,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// `Sales.xlsx` with sheets "2023" (Region/Amount, East/West/East) and "2024"
fn sales_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("Sales.xlsx");
    let mut writer = ExcelWriter::new(&path, "2023").unwrap();
    writer.write_header(["Region", "Amount"]).unwrap();
    writer
        .write_row(&[CellValue::from("East"), CellValue::Int(100)])
        .unwrap();
    writer
        .write_row(&[CellValue::from("West"), CellValue::Int(200)])
        .unwrap();
    writer
        .write_row(&[CellValue::from("East"), CellValue::Int(300)])
        .unwrap();

    writer.add_sheet("2024").unwrap();
    writer.write_header(["Region", "Amount", "Owner"]).unwrap();
    writer
        .write_row(&[
            CellValue::from("North"),
            CellValue::Float(12.5),
            CellValue::from("Ann"),
        ])
        .unwrap();
    writer.save().unwrap();
    path
}

fn read_all(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut reader = ExcelReader::open(path).unwrap();
    reader
        .rows(sheet)
        .unwrap()
        .map(|row| {
            let row = row.unwrap();
            row.iter().map(|(_, value)| value.as_string()).collect()
        })
        .collect()
}

/// Minimal single-sheet XLSX with the given `<sheetData>` body, for layouts
/// `ExcelWriter` never produces (formatted but empty cells)
fn raw_workbook(path: &Path, sheet: &str, sheet_data: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                sheet
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                sheet_data
            ),
        ),
    ];

    for (name, body) in parts {
        zip.start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn text_cell(reference: &str, text: &str) -> String {
    format!(r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#, reference, text)
}

fn analyse(path: &Path) -> WorkbookAnalysis {
    analyze_workbook(path, &mut ProgressReporter::silent()).unwrap()
}

fn init_tracing() {
    // RUST_LOG=excelsplit=debug shows engine events; repeat calls are no-ops
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    init_tracing();
    let dir = tempdir().unwrap();
    let source = sales_workbook(dir.path());
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    (dir, source, out)
}

#[test]
fn test_list_sheets_in_file_order() {
    let (_dir, source, _) = setup();
    assert_eq!(list_sheets(&source).unwrap(), vec!["2023", "2024"]);
}

#[test]
fn test_analysis_headers_round_trip() {
    let (_dir, source, _) = setup();
    let analysis = analyse(&source);

    assert_eq!(analysis.sheet_names(), vec!["2023", "2024"]);
    let headers = analysis.headers("2023").unwrap();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec![(0, "Region"), (1, "Amount")]);
    assert_eq!(
        analysis.headers("2024").unwrap().names(),
        vec!["Region", "Amount", "Owner"]
    );
}

#[test]
fn test_analysis_progress_per_sheet() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Three.xlsx");
    let mut writer = ExcelWriter::new(&path, "a").unwrap();
    writer.write_header(["x"]).unwrap();
    writer.add_sheet("b").unwrap();
    writer.write_header(["y"]).unwrap();
    writer.add_sheet("c").unwrap();
    writer.write_header(["z"]).unwrap();
    writer.save().unwrap();

    let mut events: Vec<ProgressEvent> = Vec::new();
    {
        let mut progress = ProgressReporter::new(|e| events.push(e));
        analyze_workbook(&path, &mut progress).unwrap();
    }

    let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
    assert_eq!(percents, vec![34, 67, 100]);
    assert!(events[0].status.contains("(a)"));
}

#[test]
fn test_empty_sheet_has_empty_header_map() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Blank.xlsx");
    let mut writer = ExcelWriter::new(&path, "empty").unwrap();
    writer.add_sheet("filled").unwrap();
    writer.write_header(["Name"]).unwrap();
    writer.save().unwrap();

    let analysis = analyse(&path);
    assert!(analysis.headers("empty").unwrap().is_empty());
    assert_eq!(analysis.headers("filled").unwrap().len(), 1);
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "a,b\n1,2\n").unwrap();

    let err = analyze_workbook(&path, &mut ProgressReporter::silent()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileFormat);
}

#[test]
fn test_split_by_sheet() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    let request = SplitRequest::by_sheets(["2023"]).unwrap();
    let summary = split_workbook(
        &source,
        &analysis,
        &request,
        &out,
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap();

    let expected = out.join("Sales.xlsx_2023.xlsx");
    assert_eq!(summary.files, vec![expected.clone()]);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);

    let rows = read_all(&expected, "2023");
    assert_eq!(
        rows,
        vec![
            vec!["Region", "Amount"],
            vec!["East", "100"],
            vec!["West", "200"],
            vec!["East", "300"],
        ]
    );
}

#[test]
fn test_split_all_sheets_reports_progress() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    let mut percents = Vec::new();
    let summary = {
        let mut progress = ProgressReporter::new(|e: ProgressEvent| percents.push(e.percent));
        split_workbook(
            &source,
            &analysis,
            &SplitRequest::all_sheets(&analysis).unwrap(),
            &out,
            EngineConfig::default(),
            &mut progress,
        )
        .unwrap()
    };

    assert_eq!(summary.files_written(), 2);
    assert_eq!(percents, vec![50, 100]);
    assert_eq!(
        read_all(&out.join("Sales.xlsx_2024.xlsx"), "2024"),
        vec![vec!["Region", "Amount", "Owner"], vec!["North", "12.5", "Ann"]]
    );
}

#[test]
fn test_split_by_column_partitions_rows() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    // Batches smaller than the sheet exercise the multi-flush path
    let config = EngineConfig::builder().batch_capacity(2).build().unwrap();
    let request = SplitRequest::by_column("2023", "Region").unwrap();
    let summary = split_workbook(
        &source,
        &analysis,
        &request,
        &out,
        config,
        &mut ProgressReporter::silent(),
    )
    .unwrap();

    assert_eq!(
        summary.files,
        vec![
            out.join("Sales.xlsx_East.xlsx"),
            out.join("Sales.xlsx_West.xlsx")
        ]
    );
    assert_eq!(summary.rows_written, 3);

    let east = read_all(&out.join("Sales.xlsx_East.xlsx"), "2023");
    assert_eq!(
        east,
        vec![
            vec!["Region", "Amount"],
            vec!["East", "100"],
            vec!["East", "300"],
        ]
    );
    let west = read_all(&out.join("Sales.xlsx_West.xlsx"), "2023");
    assert_eq!(west.len(), 2);
}

#[test]
fn test_split_by_column_blank_values() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("Orders.xlsx");
    let mut writer = ExcelWriter::new(&source, "orders").unwrap();
    writer.write_header(["Id", "Status"]).unwrap();
    writer
        .write_row(&[CellValue::Int(1), CellValue::Int(0)])
        .unwrap();
    writer
        .write_row(&[CellValue::Int(2), CellValue::Empty])
        .unwrap();
    writer
        .write_row(&[CellValue::Int(3), CellValue::from("")])
        .unwrap();
    writer.save().unwrap();

    let analysis = analyse(&source);
    let summary = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_column("orders", "Status").unwrap(),
        dir.path(),
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap();

    assert_eq!(
        summary.files,
        vec![
            dir.path().join("Orders.xlsx_0.xlsx"),
            dir.path().join(format!("Orders.xlsx_{}.xlsx", GroupKey::Missing)),
        ]
    );
    assert_eq!(read_all(&summary.files[1], "orders").len(), 3);
}

#[test]
fn test_missing_column_writes_nothing() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    let err = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_column("2023", "Country").unwrap(),
        &out,
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap_err();

    assert!(matches!(err, ExcelError::ColumnNotFound { .. }));
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_unknown_sheet_is_sheet_not_found() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    let err = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_sheets(["2025"]).unwrap(),
        &out,
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SheetNotFound);
}

#[test]
fn test_missing_output_directory() {
    let (dir, source, _) = setup();
    let analysis = analyse(&source);

    let err = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_sheets(["2023"]).unwrap(),
        dir.path().join("nope"),
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_split_is_deterministic() {
    let (_dir, source, out) = setup();
    let analysis = analyse(&source);

    for request in [
        SplitRequest::by_sheets(["2023", "2024"]).unwrap(),
        SplitRequest::by_column("2023", "Region").unwrap(),
    ] {
        assert_split_repeats(&source, &analysis, &request, &out);
    }
}

fn assert_split_repeats(
    source: &Path,
    analysis: &WorkbookAnalysis,
    request: &SplitRequest,
    out: &Path,
) {
    let run = || {
        split_workbook(
            source,
            analysis,
            request,
            out,
            EngineConfig::default(),
            &mut ProgressReporter::silent(),
        )
        .unwrap()
    };

    let first = run();
    let first_bytes: Vec<Vec<u8>> = first.files.iter().map(|f| std::fs::read(f).unwrap()).collect();
    let second = run();
    let second_bytes: Vec<Vec<u8>> = second.files.iter().map(|f| std::fs::read(f).unwrap()).collect();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_background_analysis_then_split() {
    let (_dir, source, out) = setup();

    let analysis = Arc::new(spawn_analysis(&source).wait().unwrap());
    assert_eq!(analysis.len(), 2);

    let task = spawn_split(
        &source,
        analysis,
        SplitRequest::by_sheets(["2024", "2023"]).unwrap(),
        &out,
        EngineConfig::default(),
    );

    let mut percents = Vec::new();
    let mut results = Vec::new();
    for event in task.events().clone().iter() {
        match event {
            TaskEvent::Progress(p) => {
                assert!(results.is_empty(), "progress after the terminal result");
                percents.push(p.percent);
            }
            TaskEvent::Finished(result) => results.push(result),
        }
    }

    assert_eq!(results.len(), 1);
    let summary = results.pop().unwrap().unwrap();
    assert_eq!(
        summary.files,
        vec![
            out.join("Sales.xlsx_2024.xlsx"),
            out.join("Sales.xlsx_2023.xlsx")
        ]
    );
    assert_eq!(percents, vec![50, 100]);
}

#[test]
fn test_background_failure_is_single_terminal_event() {
    let dir = tempdir().unwrap();
    let err = spawn_analysis(dir.path().join("missing.xlsx"))
        .wait()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileFormat);
}

#[test]
fn test_background_cancel_before_start() {
    let (_dir, source, out) = setup();
    let analysis = Arc::new(analyse(&source));

    // Cancel raced against the worker; either it lands first or the split finishes
    let task = spawn_split(
        &source,
        analysis,
        SplitRequest::by_sheets(["2023", "2024"]).unwrap(),
        &out,
        EngineConfig::default(),
    );
    task.cancel();

    match task.wait() {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Canceled),
        Ok(summary) => assert_eq!(summary.files_written(), 2),
    }
}

#[test]
fn test_blank_rows_are_skipped() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("T.xlsx");

    // Formatted but empty cells in the first row and between data rows
    let sheet_data = [
        r#"<row r="1"><c r="A1" s="0"/><c r="B1" s="0"/></row>"#.to_string(),
        format!(r#"<row r="2">{}{}</row>"#, text_cell("A2", "K"), text_cell("B2", "V")),
        format!(r#"<row r="3">{}{}</row>"#, text_cell("A3", "East"), text_cell("B3", "a")),
        r#"<row r="4"><c r="A4" s="0"/><c r="B4" s="0"/></row>"#.to_string(),
        format!(r#"<row r="5">{}{}</row>"#, text_cell("A5", "East"), text_cell("B5", "b")),
    ]
    .concat();
    raw_workbook(&source, "s", &sheet_data);

    let analysis = analyse(&source);
    assert_eq!(analysis.headers("s").unwrap().names(), vec!["K", "V"]);

    let summary = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_column("s", "K").unwrap(),
        dir.path(),
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap();
    assert_eq!(summary.files, vec![dir.path().join("T.xlsx_East.xlsx")]);
    assert_eq!(summary.rows_written, 2);

    let summary = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_sheets(["s"]).unwrap(),
        dir.path(),
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap();
    assert_eq!(
        read_all(&summary.files[0], "s"),
        vec![vec!["K", "V"], vec!["East", "a"], vec!["East", "b"]]
    );
}

#[test]
fn test_colliding_group_file_names_write_nothing() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("T.xlsx");
    let mut writer = ExcelWriter::new(&source, "s").unwrap();
    writer.write_header(["Id", "K"]).unwrap();
    writer
        .write_row(&[CellValue::Int(1), CellValue::from(GroupKey::Missing.label())])
        .unwrap();
    writer
        .write_row(&[CellValue::Int(2), CellValue::Empty])
        .unwrap();
    writer.save().unwrap();

    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let analysis = analyse(&source);

    let err = split_workbook(
        &source,
        &analysis,
        &SplitRequest::by_column("s", "K").unwrap(),
        &out,
        EngineConfig::default(),
        &mut ProgressReporter::silent(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_dates_keep_their_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Dates.xlsx");
    let mut writer = ExcelWriter::new(&path, "d").unwrap();
    writer.write_header(["When"]).unwrap();
    writer.write_row(&[CellValue::DateTime(45292.0)]).unwrap();
    writer.save().unwrap();

    let mut reader = ExcelReader::open(&path).unwrap();
    let rows: Vec<_> = reader.rows("d").unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows[1].get(0), Some(&CellValue::DateTime(45292.0)));
}
