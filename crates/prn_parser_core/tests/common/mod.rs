#![allow(dead_code)]

use std::io::Cursor;

use prn_parser_core::{AnalysisSummary, Options, Row, RowKind, analyse};

pub const UEL: &[u8] = b"\x1b%-12345X";

pub fn run(data: &[u8], options: &Options) -> (Vec<Row>, AnalysisSummary) {
    let mut rows = Vec::new();
    let summary = analyse(&mut Cursor::new(data.to_vec()), options, &mut rows).unwrap();
    (rows, summary)
}

pub fn rows_of(data: &[u8]) -> Vec<Row> {
    run(data, &Options::default()).0
}

pub fn of_kind(rows: &[Row], kind: RowKind) -> Vec<&Row> {
    rows.iter().filter(|r| r.kind == kind).collect()
}

pub fn descriptions(rows: &[Row], kind: RowKind) -> Vec<String> {
    of_kind(rows, kind).into_iter().map(|r| r.description.clone()).collect()
}

/// PJL wrapped job: UEL, PJL header entering `language`, the job body and a closing UEL.
pub fn pjl_job(language: &str, body: &[u8]) -> Vec<u8> {
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL JOB NAME=\"test\"\r\n");
    data.extend_from_slice(format!("@PJL ENTER LANGUAGE={language}\r\n").as_bytes());
    data.extend_from_slice(body);
    data.extend_from_slice(UEL);
    data.extend_from_slice(b"@PJL EOJ\r\n");
    data.extend_from_slice(UEL);
    data
}

/// Little-endian PCL XL session with `pages` pages, each drawing nothing but a PushGS/PopGS pair.
pub fn pclxl_session(pages: usize) -> Vec<u8> {
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    // Measure = 0, BeginSession
    data.extend_from_slice(&[0xC0, 0x00, 0xF8, 0x86, 0x41]);
    for _ in 0..pages {
        data.extend_from_slice(&[0x43, 0x61, 0x60, 0x44]);
    }
    data.push(0x42);
    data
}

/// Mixed stream touching every decoded language.
pub fn mixed_stream() -> Vec<u8> {
    let mut pcl = b"\x1bE\x1b&l1o2a0E\x1b&a100h200V".to_vec();
    pcl.extend_from_slice(b"The quick brown fox jumps over the lazy dog, again and again and again.\r\n");
    pcl.extend_from_slice(b"\x1b*b5W\x01\x02\x03\x04\x05");
    pcl.extend_from_slice(b"\x1b%1BIN;SP1;PU100,100;PD200,200;LBHello HP-GL/2\x03;\x1b%0A");
    pcl.extend_from_slice(b"!R! RES; UNIT C; EXIT;");
    pcl.extend_from_slice(b"Back in PCL\x0c\x1bE");

    let mut data = pjl_job("PCL", &pcl);
    data.extend_from_slice(b"@PJL ENTER LANGUAGE=PCLXL\r\n");
    data.extend_from_slice(&pclxl_session(2));
    data.extend_from_slice(UEL);
    data
}
