mod common;

use std::io::Cursor;

use common::{UEL, of_kind, pclxl_session, run};
use pretty_assertions::assert_eq;
use prn_parser_core::{
    AnalysisError, Language, Options, PclOverlaySettings, PclXlOverlaySettings, Row, RowKind, make_overlay_pcl, make_overlay_pcl_stream, make_overlay_pclxl_stream,
};

fn pcl_overlay(data: &[u8], settings: &PclOverlaySettings) -> (Vec<u8>, Vec<Row>, Result<prn_parser_core::OverlaySummary, AnalysisError>) {
    let mut output = Vec::new();
    let mut rows = Vec::new();
    let result = make_overlay_pcl_stream(&mut Cursor::new(data.to_vec()), &mut output, &Options::default(), settings, &mut rows);
    (output, rows, result)
}

const TWO_PAGES: &[u8] = b"\x1bE\x1b&l1e6d1OHello\x0cWorld\x0c\x1bE";

#[test]
fn test_first_page_macro() {
    let (output, _, result) = pcl_overlay(TWO_PAGES, &PclOverlaySettings::default());
    let summary = result.unwrap();
    assert_eq!(output, b"\x1b&f1Y\x1b&f0X\x1b&f0S\x1b&l1e6DHello\x1b&f1S\x1b&f1X".to_vec());
    assert_eq!(summary.bytes_written, output.len() as u64);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.path, None);
}

#[test]
fn test_plain_overlay() {
    let settings = PclOverlaySettings {
        restore_cursor: false,
        encapsulate: false,
        macro_id: 1,
    };
    let (output, rows, result) = pcl_overlay(TWO_PAGES, &settings);
    result.unwrap();
    assert_eq!(output, b"\x1b&l1e6DHello".to_vec());

    let adjust: Vec<&Row> = rows.iter().filter(|r| r.kind == RowKind::Overlay && r.type_label == "Adjust").collect();
    assert_eq!(adjust.len(), 1);
    assert_eq!(adjust[0].sequence, "6D");
}

#[test]
fn test_combo_without_kept_root() {
    // orientation is dropped, the kept groups need a root of their own
    let settings = PclOverlaySettings {
        restore_cursor: false,
        encapsulate: false,
        macro_id: 1,
    };
    let (output, _, result) = pcl_overlay(b"\x1b&l1o6DXY\x0c", &settings);
    result.unwrap();
    assert_eq!(output, b"\x1b&l6DXY".to_vec());
}

#[test]
fn test_combo_inner_group_removed() {
    // orientation sits between two kept groups; only its own bytes go
    let settings = PclOverlaySettings {
        restore_cursor: false,
        encapsulate: false,
        macro_id: 1,
    };
    let source = b"\x1b&l1e1o6DHello\x0c";
    let (output, _, result) = pcl_overlay(source, &settings);
    result.unwrap();
    assert_eq!(output, b"\x1b&l1e6DHello".to_vec());
    assert_eq!(output.len(), source.len() - b"1o".len() - b"\x0c".len());
}

#[test]
fn test_oversized_data_length_copied_to_end() {
    let (output, rows, result) = pcl_overlay(b"Hi\x1b*b9223372036854775807WABC", &PclOverlaySettings::default());
    result.unwrap();
    assert_eq!(output, b"\x1b&f1Y\x1b&f0X\x1b&f0SHi\x1b*b9223372036854775807WABC\x1b&f1S\x1b&f1X".to_vec());
    assert!(of_kind(&rows, RowKind::MsgWarning).iter().any(|r| r.description.starts_with("Binary data truncated")));
}

#[test]
fn test_overlay_output_reparses() {
    let mut source = UEL.to_vec();
    source.extend_from_slice(b"@PJL ENTER LANGUAGE=PCL\r\n");
    source.extend_from_slice(TWO_PAGES);
    source.extend_from_slice(UEL);

    let (output, _, result) = pcl_overlay(&source, &PclOverlaySettings::default());
    let summary = result.unwrap();
    assert_eq!(summary.analysis.initial_language, Language::Pjl);

    let (rows, reparsed) = run(&output, &Options::default());
    assert!(!reparsed.invalid_sequences_seen);
    assert!(of_kind(&rows, RowKind::MsgWarning).is_empty());
    assert_eq!(reparsed.initial_language, Language::Pcl);
}

#[test]
fn test_macro_id_collision() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.pcl");
    let target = dir.path().join("overlay.pcl");
    std::fs::write(&source, b"\x1b&f7Y\x1b&f0XHello\x1b&f1X\x1b&f7y2XText\x0c").unwrap();

    let settings = PclOverlaySettings {
        macro_id: 7,
        ..Default::default()
    };
    let mut rows = Vec::new();
    let result = make_overlay_pcl(&source, &target, &Options::default(), &settings, &mut rows);
    assert!(result.as_ref().is_err_and(|err| err.is_collision()));

    match result {
        Err(AnalysisError::MacroIdentifierCollision { id }) => assert_eq!(id, 7),
        other => panic!("expected a macro id collision, got {other:?}"),
    }
    let errors = of_kind(&rows, RowKind::MsgError);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].description, "Macro identifier 7 is already used by the source stream; overlay aborted");
    assert!(!target.exists());
}

#[test]
fn test_overlay_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.pcl");
    let target = dir.path().join("overlay.pcl");
    std::fs::write(&source, TWO_PAGES).unwrap();

    let mut rows = Vec::new();
    let summary = make_overlay_pcl(&source, &target, &Options::default(), &PclOverlaySettings::default(), &mut rows).unwrap();
    assert_eq!(summary.path.as_deref(), Some(target.as_path()));
    assert_eq!(std::fs::read(&target).unwrap().len() as u64, summary.bytes_written);
}

#[test]
fn test_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = Vec::new();
    let result = make_overlay_pcl(&dir.path().join("missing.pcl"), &dir.path().join("out.pcl"), &Options::default(), &PclOverlaySettings::default(), &mut rows);
    assert!(matches!(result, Err(AnalysisError::Open { .. })));
}

#[test]
fn test_unsupported_source_language() {
    let (output, _, result) = pcl_overlay(b"%!PS-Adobe-3.0\nshowpage\n", &PclOverlaySettings::default());
    assert!(matches!(result, Err(AnalysisError::UnsupportedOverlayLanguage(Language::PostScript))));
    assert!(output.is_empty());
}

#[test]
fn test_empty_source() {
    let (output, rows, result) = pcl_overlay(b"", &PclOverlaySettings::default());
    let summary = result.unwrap();
    assert_eq!(summary.pages, 0);
    // header and trailer only
    assert_eq!(output, b"\x1b&f1Y\x1b&f0X\x1b&f0S\x1b&f1S\x1b&f1X".to_vec());
    assert_eq!(rows[0].description, "Input is empty, nothing to analyse");
}

#[test]
fn test_pclxl_stream_overlay() {
    let mut output = Vec::new();
    let mut rows = Vec::new();
    let summary = make_overlay_pclxl_stream(&mut Cursor::new(pclxl_session(2)), &mut output, &Options::default(), &PclXlOverlaySettings::default(), &mut rows).unwrap();
    assert_eq!(summary.pages, 2);
    assert!(output.starts_with(b") HP-PCL XL;2;0;"));
    assert!(output.windows(7).any(|w| w == b"Overlay"));
    assert_eq!(output.last(), Some(&0x5D));

    let (rows, reparsed) = run(&output, &Options::default());
    assert!(!reparsed.invalid_sequences_seen);
    let nested: Vec<String> = rows.iter().filter(|r| r.analysis_level == 1 && r.kind == RowKind::PclXlOperator).map(|r| r.description.clone()).collect();
    assert_eq!(nested, vec!["PushGS", "PushGS", "PopGS", "PopGS"]);
}

#[test]
fn test_pclxl_stream_name_collision() {
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0x41, 0xC8, 0xC0, 0x07]);
    data.extend_from_slice(b"Overlay");
    data.extend_from_slice(&[0xF8, 0x8B, 0x5B, 0x42]);

    let mut output = Vec::new();
    let mut rows = Vec::new();
    let result = make_overlay_pclxl_stream(&mut Cursor::new(data), &mut output, &Options::default(), &PclXlOverlaySettings::default(), &mut rows);
    match result {
        Err(AnalysisError::StreamNameCollision { name }) => assert_eq!(name, "Overlay"),
        other => panic!("expected a stream name collision, got {other:?}"),
    }
    assert_eq!(of_kind(&rows, RowKind::MsgError).len(), 1);
}
