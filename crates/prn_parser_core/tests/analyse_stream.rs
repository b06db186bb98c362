mod common;

use std::io::Cursor;

use common::{UEL, descriptions, mixed_stream, of_kind, pjl_job, pclxl_session, rows_of, run};
use pretty_assertions::assert_eq;
use prn_parser_core::{Language, NullSink, Options, RowKind, analyse, scan_language_stream};

#[test]
fn test_empty_input() {
    let (rows, summary) = run(b"", &Options::default());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, RowKind::MsgComment);
    assert_eq!(rows[0].description, "Input is empty, nothing to analyse");
    assert_eq!(summary.language_switches, 0);
}

#[test]
fn test_initial_language_row() {
    let rows = rows_of(b"\x1bE");
    assert_eq!(rows[0].kind, RowKind::MsgComment);
    assert_eq!(rows[0].description, "Analysis starts in PCL");

    let rows = rows_of(&pclxl_session(1));
    assert_eq!(rows[0].description, "Analysis starts in PCL XL");
}

#[test]
fn test_pjl_pcl_pjl_switches() {
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL ENTER LANGUAGE=PCL\r\n\x1bEHello\x1bE");
    data.extend_from_slice(UEL);

    let (rows, summary) = run(&data, &Options::default());
    let switches: Vec<&str> = rows.iter().filter(|r| r.description.contains("switched to")).map(|r| r.description.as_str()).collect();
    assert_eq!(switches, vec!["Language switched to PCL from PJL", "Language switched to PJL from PCL"]);
    assert_eq!(summary.initial_language, Language::Pjl);
    assert_eq!(summary.final_language, Language::Pjl);
    assert_eq!(summary.language_switches, 2);

    // the UEL is reported once each time, by the PJL parser
    let uel_rows: Vec<_> = rows.iter().filter(|r| r.description == "Universal Exit Language").collect();
    assert_eq!(uel_rows.len(), 2);
    assert!(uel_rows.iter().all(|r| r.kind == RowKind::PjlCommand));
    assert_eq!(uel_rows[1].offset, (data.len() - UEL.len()) as i64);
}

#[test]
fn test_pcl_rows() {
    let rows = rows_of(b"\x1bE\x1b&l1o2a0EText\r\n");
    let sequences: Vec<&str> = of_kind(&rows, RowKind::PclSequence).into_iter().map(|r| r.sequence.as_str()).collect();
    assert_eq!(sequences, vec!["<ESC>E", "<ESC>&l1O", "<ESC>&l2A", "<ESC>&l0E"]);

    let text = of_kind(&rows, RowKind::PclText);
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].offset, 11);
    assert_eq!(text[0].description, "4 characters");
    assert_eq!(of_kind(&rows, RowKind::PclControl).len(), 2);
}

#[test]
fn test_pcl_text_chunks() {
    let data = vec![b'x'; 100];
    let options = Options {
        text_chunk: 40,
        ..Default::default()
    };
    let (rows, _) = run(&data, &options);
    assert_eq!(descriptions(&rows, RowKind::PclText), vec!["40 characters", "40 characters", "20 characters"]);
}

#[test]
fn test_pcl_inclusion_flags() {
    let mut options = Options::default();
    options.pcl.show_text = false;
    options.pcl.show_control_codes = false;
    let (rows, _) = run(b"\x1bEHello\r\n\x1b&l0O", &options);
    assert!(of_kind(&rows, RowKind::PclText).is_empty());
    assert!(of_kind(&rows, RowKind::PclControl).is_empty());
    assert_eq!(of_kind(&rows, RowKind::PclSequence).len(), 2);
}

#[test]
fn test_pcl_binary_data_skipped() {
    // the payload contains an ESC that must not be parsed
    let rows = rows_of(b"\x1b*b4W\x1bE\x00\x01\x1b*rC");
    let sequences: Vec<&str> = of_kind(&rows, RowKind::PclSequence).into_iter().map(|r| r.sequence.as_str()).collect();
    assert_eq!(sequences, vec!["<ESC>*b4W", "<ESC>*rC"]);
    assert_eq!(of_kind(&rows, RowKind::PclData).len(), 1);
}

#[test]
fn test_pcl_data_length_beyond_input() {
    let (rows, summary) = run(b"\x1b*b9223372036854775807WABC", &Options::default());
    assert_eq!(descriptions(&rows, RowKind::PclData), vec!["3 bytes of Transfer Raster Data by Row/Block data"]);
    let warnings = of_kind(&rows, RowKind::MsgWarning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].offset, 23);
    assert_eq!(warnings[0].description, "Binary data truncated: 3 of 9223372036854775807 bytes present");
    assert!(summary.invalid_sequences_seen);
    assert_eq!(summary.end_offset, 26);
}

#[test]
fn test_incomplete_sequence_at_eof() {
    let (rows, summary) = run(b"\x1bE\x1b&l12", &Options::default());
    let warnings = of_kind(&rows, RowKind::MsgWarning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].description.starts_with("Incomplete sequence at end of file"));
    assert!(summary.invalid_sequences_seen);
}

#[test]
fn test_hpgl2_rows() {
    let rows = rows_of(b"\x1b%1BIN;SP1;PD100,100;LBLabel\x03;\x1b%0A");
    let commands = of_kind(&rows, RowKind::Hpgl2Command);
    let mnemonics: Vec<&str> = commands.iter().map(|r| &r.sequence[..2]).collect();
    assert_eq!(mnemonics, vec!["IN", "SP", "PD", "LB"]);
    assert_eq!(commands[3].description, "Label: \"Label\"");
    assert!(rows.iter().any(|r| r.description == "Language switched to HP-GL/2 from PCL"));
    assert!(rows.iter().any(|r| r.description == "Language switched to PCL from HP-GL/2"));
}

#[test]
fn test_hpgl2_label_terminator() {
    let rows = rows_of(b"\x1b%1BDT*;LBstar*;LBnext\x03;");
    let labels = descriptions(&rows, RowKind::Hpgl2Command).into_iter().filter(|d| d.starts_with("Label")).collect::<Vec<_>>();
    // DT changes the terminator of every following label
    assert_eq!(labels, vec!["Label: \"star\"", "Label: \"next\x03;\""]);
}

#[test]
fn test_hpgl2_unterminated_label_before_uel() {
    let (rows, summary) = run(b"\x1b%1BIN;LBunterminated label\x1b%-12345X@PJL EOJ\r\n", &Options::default());
    let labels = descriptions(&rows, RowKind::Hpgl2Command).into_iter().filter(|d| d.starts_with("Label")).collect::<Vec<_>>();
    assert_eq!(labels, vec!["Label: \"unterminated label\""]);
    assert_eq!(descriptions(&rows, RowKind::MsgWarning), vec!["Label not terminated before escape sequence"]);
    assert!(rows.iter().any(|r| r.description == "Language switched to PJL from HP-GL/2"));
    assert!(descriptions(&rows, RowKind::PjlCommand).contains(&"Universal Exit Language".to_string()));
    assert_eq!(summary.final_language, Language::Pjl);
    assert!(summary.invalid_sequences_seen);
}

#[test]
fn test_prescribe_block() {
    let rows = rows_of(b"\x1bE!R! RES; FOO; EXIT;Text");
    let prescribe = of_kind(&rows, RowKind::PrescribeCommand);
    let descs: Vec<&str> = prescribe.iter().map(|r| r.description.as_str()).collect();
    assert_eq!(descs, vec!["Start of Prescribe commands", "Reset", "Unknown command FOO", "Exit Prescribe"]);
    assert!(rows.iter().any(|r| r.description == "Language switched to PCL from Prescribe"));
    assert_eq!(descriptions(&rows, RowKind::PclText), vec!["4 characters"]);
}

#[test]
fn test_pjl_comment_flag() {
    let data = pjl_job("PCL", b"\x1bE");
    let rows = rows_of(&data);
    let pjl = descriptions(&rows, RowKind::PjlCommand);
    assert!(pjl.contains(&"Start of job: NAME=\"test\"".to_string()));
    assert!(pjl.contains(&"Enter language: LANGUAGE=PCL".to_string()));

    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL COMMENT hidden\r\n@PJL\r\n");
    let mut options = Options::default();
    options.pjl.show_comments = false;
    let (rows, _) = run(&data, &options);
    assert_eq!(descriptions(&rows, RowKind::PjlCommand), vec!["Universal Exit Language", "Prefix"]);
}

#[test]
fn test_pclxl_rows() {
    let rows = rows_of(&pclxl_session(1));
    let header = of_kind(&rows, RowKind::PclXlHeader);
    assert_eq!(header.len(), 1);
    assert_eq!(header[0].description, "Binding: little-endian");

    let operators = descriptions(&rows, RowKind::PclXlOperator);
    assert_eq!(operators, vec!["BeginSession", "BeginPage", "PushGS", "PopGS", "EndPage", "EndSession"]);
    assert_eq!(of_kind(&rows, RowKind::PclXlAttribute).len(), 1);
}

#[test]
fn test_pclxl_font_header_recursion() {
    let header: [u8; 8] = [0, 0, 0x02, 0x77, 254, 0, 0, 1];
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0x41, 0x4F, 0x50, 0xFA]);
    data.extend_from_slice(&(header.len() as u32).to_le_bytes());
    data.extend_from_slice(&header);
    data.extend_from_slice(&[0x51, 0x42]);

    let (rows, summary) = run(&data, &Options::default());
    let open = rows.iter().position(|r| r.description == ">>>> font header: 8 bytes").unwrap();
    let close = rows.iter().position(|r| r.description == "<<<< font header: 8 bytes").unwrap();
    assert!(open < close);
    assert!(rows[open + 1..close].iter().all(|r| r.analysis_level == 1));
    assert!(rows[open + 1..close].iter().any(|r| r.kind == RowKind::PclXlFontHeader));
    assert_eq!(rows[open].analysis_level, 0);
    assert_eq!(summary.embedded_passes, 1);

    // the payload is analysed once the header download ends
    let end_header = rows.iter().position(|r| r.description == "EndFontHeader").unwrap();
    assert!(end_header < open);
}

#[test]
fn test_pclxl_embedding_depth_cap() {
    let header: [u8; 8] = [0, 0, 0x02, 0x77, 254, 0, 0, 1];
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0x50, 0xFA]);
    data.extend_from_slice(&(header.len() as u32).to_le_bytes());
    data.extend_from_slice(&header);
    data.push(0x51);

    let options = Options {
        max_embed_depth: 0,
        ..Default::default()
    };
    let (rows, summary) = run(&data, &options);
    let errors = of_kind(&rows, RowKind::MsgError);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].description.starts_with("Embedded data nested deeper than 0 levels"));
    assert!(summary.invalid_sequences_seen);
    assert_eq!(summary.embedded_passes, 0);
}

#[test]
fn test_pass_through_recursion() {
    let pcl = b"\x1b&l0O";
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0x41, 0xBF, 0xFB, pcl.len() as u8]);
    data.extend_from_slice(pcl);
    data.push(0x42);

    let rows = rows_of(&data);
    let open = rows.iter().position(|r| r.description == ">>>> PassThrough: 5 bytes").unwrap();
    assert_eq!(rows[open + 1].kind, RowKind::PclSequence);
    assert_eq!(rows[open + 1].analysis_level, 1);
    assert_eq!(rows[open + 2].description, "<<<< PassThrough: 5 bytes");
    // EndSession follows the nested pass
    assert_eq!(rows[open + 3].description, "EndSession");
}

#[test]
fn test_offset_range() {
    let data = b"\x1bE\x1b&l0O\x1b&l1O";
    let options = Options {
        start_offset: 2,
        end_offset: Some(7),
        ..Default::default()
    };
    let (rows, summary) = run(data, &options);
    assert_eq!((summary.start_offset, summary.end_offset), (2, 7));
    let sequences = of_kind(&rows, RowKind::PclSequence);
    assert_eq!(sequences.len(), 1);
    assert_eq!(sequences[0].offset, 2);
}

#[test]
fn test_unknown_pjl_language() {
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL ENTER LANGUAGE=ZJS\r\nbinary");
    let (rows, summary) = run(&data, &Options::default());
    assert!(of_kind(&rows, RowKind::MsgWarning).iter().any(|r| r.description.starts_with("Unknown language after PJL")));
    assert!(summary.invalid_sequences_seen);
}

#[test]
fn test_postscript_is_opaque() {
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL ENTER LANGUAGE=POSTSCRIPT\r\n%!PS-Adobe-3.0\nshowpage\n");
    data.extend_from_slice(UEL);
    let (rows, summary) = run(&data, &Options::default());
    assert!(!of_kind(&rows, RowKind::OpaqueData).is_empty());
    assert!(!summary.invalid_sequences_seen);
    assert_eq!(summary.final_language, Language::Pjl);
}

#[test]
fn test_idempotent() {
    let data = mixed_stream();
    let (first, first_summary) = run(&data, &Options::default());
    let (second, second_summary) = run(&data, &Options::default());
    assert_eq!(first, second);
    assert_eq!(first_summary, second_summary);
    assert!(!first_summary.invalid_sequences_seen);
}

#[test]
fn test_mixed_stream_languages() {
    let (rows, summary) = run(&mixed_stream(), &Options::default());
    for kind in [RowKind::PjlCommand, RowKind::PclSequence, RowKind::Hpgl2Command, RowKind::PrescribeCommand, RowKind::PclXlOperator] {
        assert!(!of_kind(&rows, kind).is_empty(), "no rows of {kind:?}");
    }
    assert_eq!(summary.final_language, Language::Pjl);
}

#[test]
fn test_scan_language() {
    let options = Options::default();
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL ENTER LANGUAGE=PCLXL\r\n");
    data.extend_from_slice(&pclxl_session(1));
    assert_eq!(scan_language_stream(&mut Cursor::new(data), &options).unwrap(), Language::PclXl);

    let data = pjl_job("PCL", b"\x1bE");
    assert_eq!(scan_language_stream(&mut Cursor::new(data), &options).unwrap(), Language::Pcl);

    assert_eq!(scan_language_stream(&mut Cursor::new(b"%!PS\n".to_vec()), &options).unwrap(), Language::PostScript);
}

#[test]
fn test_null_sink() {
    let summary = analyse(&mut Cursor::new(mixed_stream()), &Options::default(), &mut NullSink).unwrap();
    assert!(summary.language_switches > 4);
}
