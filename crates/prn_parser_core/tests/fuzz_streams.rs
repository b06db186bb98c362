//! Random and truncated input must never panic and must never stall the walk.

mod common;

use std::io::Cursor;

use common::{mixed_stream, pclxl_session};
use prn_parser_core::{Language, NullSink, Options, PclOverlaySettings, PclXlOverlaySettings, analyse, make_overlay_pcl_stream, make_overlay_pclxl_stream};

const LANGUAGES: [Language; 7] = [
    Language::Pcl,
    Language::PclXl,
    Language::Hpgl2,
    Language::Pjl,
    Language::Prescribe,
    Language::PostScript,
    Language::Xl2hb,
];

fn random_bytes(rng: &mut fastrand::Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.u8(..)).collect()
}

/// Random bytes biased towards the introducers the parsers react to.
fn random_tokens(rng: &mut fastrand::Rng, len: usize) -> Vec<u8> {
    const PIECES: [&[u8]; 12] = [
        b"\x1b",
        b"\x1b%-12345X",
        b"@PJL ENTER LANGUAGE=PCL\n",
        b"\x1b&l",
        b"\x1b%1B",
        b"!R!",
        b") HP-PCL XL;2;0\n",
        b"\xfa\x10\x00\x00\x00",
        b"LB",
        b"\x0c",
        b"0123;",
        b"\x50\x51\xbf",
    ];
    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        if rng.bool() {
            data.extend_from_slice(PIECES[rng.usize(..PIECES.len())]);
        } else {
            data.push(rng.u8(..));
        }
    }
    data
}

#[test]
fn test_fuzz_random_bytes() {
    let mut rng = fastrand::Rng::with_seed(1);
    for i in 0..200 {
        let len = rng.usize(0..600);
        let data = if i % 2 == 0 { random_bytes(&mut rng, len) } else { random_tokens(&mut rng, len) };
        let language = LANGUAGES[i % LANGUAGES.len()];
        let options = Options::default().with_language(language).with_block_size(rng.usize(16..128));
        let summary = analyse(&mut Cursor::new(data.clone()), &options, &mut NullSink).unwrap();
        assert_eq!(summary.end_offset, data.len() as u64);
    }
}

#[test]
fn test_fuzz_truncated_streams() {
    let data = mixed_stream();
    for len in 0..data.len() {
        let mut rows = Vec::new();
        analyse(&mut Cursor::new(data[..len].to_vec()), &Options::default().with_block_size(32), &mut rows).unwrap();
        assert!(!rows.is_empty());
    }
}

#[test]
fn test_fuzz_overlays() {
    let mut rng = fastrand::Rng::with_seed(2);
    for _ in 0..100 {
        let len = rng.usize(0..400);
        let data = random_tokens(&mut rng, len);
        let options = Options::default().with_language(Language::Pcl).with_block_size(rng.usize(16..96));
        let mut output = Vec::new();
        // errors (collisions) are fine, panics are not
        let _ = make_overlay_pcl_stream(&mut Cursor::new(data.clone()), &mut output, &options, &PclOverlaySettings::default(), &mut NullSink);

        let mut output = Vec::new();
        let mut source = pclxl_session(2);
        source.extend_from_slice(&data);
        let _ = make_overlay_pclxl_stream(&mut Cursor::new(source), &mut output, &Options::default(), &PclXlOverlaySettings::default(), &mut NullSink);
    }
}
