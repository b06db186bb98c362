mod common;

use std::io::Cursor;

use common::{mixed_stream, pclxl_session, run};
use pretty_assertions::assert_eq;
use prn_parser_core::{NullSink, Options, PclOverlaySettings, PclXlOverlaySettings, make_overlay_pcl_stream, make_overlay_pclxl_stream};

/// Font header download followed by PassThrough PCL; `trailing` bytes follow the NULL segment.
fn font_stream(trailing: usize) -> Vec<u8> {
    let mut font = vec![0, 0, 0x02, 0x77, 254, 0, 0, 1];
    font.extend_from_slice(b"BR");
    font.extend_from_slice(&4u32.to_be_bytes());
    font.extend_from_slice(&[0, 1, 0, 1]);
    font.extend_from_slice(&[0xFF, 0xFF, 0, 0, 0, 0]);
    font.extend(std::iter::repeat_n(0xAA, trailing));

    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0x41, 0x4F, 0x50, 0xFA]);
    data.extend_from_slice(&(font.len() as u32).to_le_bytes());
    data.extend_from_slice(&font);
    data.extend_from_slice(&[0x51, 0xBF, 0xFB, 0x07]);
    data.extend_from_slice(b"\x1b&l0OAB");
    data.push(0x42);
    data
}

#[test]
fn test_rows_independent_of_block_size() {
    let data = mixed_stream();
    let (expected, expected_summary) = run(&data, &Options::default());

    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..40 {
        let options = Options::default().with_block_size(rng.usize(16..200));
        let (rows, summary) = run(&data, &options);
        assert_eq!(rows, expected, "block size {}", options.block_size);
        assert_eq!(summary, expected_summary);
    }
}

#[test]
fn test_embedded_rows_independent_of_block_size() {
    let data = font_stream(0);
    let (expected, _) = run(&data, &Options::default());
    assert!(expected.iter().any(|r| r.analysis_level == 1));

    for block_size in 16..64 {
        let (rows, _) = run(&data, &Options::default().with_block_size(block_size));
        assert_eq!(rows, expected, "block size {block_size}");
    }
}

#[test]
fn test_font_trailer_reported_once() {
    let data = font_stream(40);
    let (expected, _) = run(&data, &Options::default());
    let trailer: Vec<_> = expected.iter().filter(|r| r.description.ends_with("after the NULL segment")).collect();
    assert_eq!(trailer.len(), 1);
    assert_eq!(trailer[0].description, "40 bytes after the NULL segment");

    for block_size in 16..64 {
        let (rows, _) = run(&data, &Options::default().with_block_size(block_size));
        assert_eq!(rows, expected, "block size {block_size}");
    }
}

#[test]
fn test_oversized_data_length_independent_of_block_size() {
    let mut data = b"\x1bE\x1b*b9223372036854775807W".to_vec();
    data.extend_from_slice(&[0x1b; 100]);
    let (expected, expected_summary) = run(&data, &Options::default());
    assert!(expected_summary.invalid_sequences_seen);

    for block_size in 16..48 {
        let (rows, summary) = run(&data, &Options::default().with_block_size(block_size));
        assert_eq!(rows, expected, "block size {block_size}");
        assert_eq!(summary, expected_summary);
    }
}

#[test]
fn test_small_block_size_is_raised() {
    let data = mixed_stream();
    let (expected, _) = run(&data, &Options::default().with_block_size(16));
    let (rows, _) = run(&data, &Options::default().with_block_size(1));
    assert_eq!(rows, expected);
}

#[test]
fn test_overlay_independent_of_block_size() {
    let source = b"\x1bE\x1b&l1e6d1O\x1b&a100h200VSome text on the first page\x0cSecond page\x0c\x1bE".to_vec();
    let overlay = |block_size: usize| {
        let mut output = Vec::new();
        let options = Options::default().with_block_size(block_size);
        make_overlay_pcl_stream(&mut Cursor::new(source.clone()), &mut output, &options, &PclOverlaySettings::default(), &mut NullSink).unwrap();
        output
    };
    let expected = overlay(2048);
    for block_size in 16..48 {
        assert_eq!(overlay(block_size), expected, "block size {block_size}");
    }

    let source = pclxl_session(3);
    let overlay = |block_size: usize| {
        let mut output = Vec::new();
        let options = Options::default().with_block_size(block_size);
        make_overlay_pclxl_stream(&mut Cursor::new(source.clone()), &mut output, &options, &PclXlOverlaySettings::default(), &mut NullSink).unwrap();
        output
    };
    let expected = overlay(2048);
    for block_size in 16..32 {
        assert_eq!(overlay(block_size), expected, "block size {block_size}");
    }
}
