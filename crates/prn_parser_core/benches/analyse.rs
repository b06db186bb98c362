use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use prn_parser_core::{NullSink, Options, PclOverlaySettings, analyse, make_overlay_pcl_stream};
use std::io::Cursor;

const UEL: &[u8] = b"\x1b%-12345X";

fn pcl_pages(pages: usize) -> Vec<u8> {
    let mut data = UEL.to_vec();
    data.extend_from_slice(b"@PJL JOB NAME=\"bench\"\r\n@PJL ENTER LANGUAGE=PCL\r\n\x1bE\x1b&l0o2a0E");
    for page in 0..pages {
        for line in 0..60 {
            data.extend_from_slice(format!("\x1b&a{}V\x1b(s0p12h10v0s0b3T", line * 120).as_bytes());
            data.extend_from_slice(format!("Page {page} line {line}: the quick brown fox jumps over the lazy dog\r\n").as_bytes());
        }
        data.extend_from_slice(b"\x1b*t300R\x1b*r1A");
        for _ in 0..64 {
            data.extend_from_slice(b"\x1b*b32W");
            data.extend_from_slice(&[0x55; 32]);
        }
        data.extend_from_slice(b"\x1b*rC\x1b%1BIN;SP1;PU0,0;PD1000,0,1000,1000,0,1000,0,0;LBbench\x03;\x1b%0A\x0c");
    }
    data.extend_from_slice(b"\x1bE");
    data.extend_from_slice(UEL);
    data
}

fn pclxl_pages(pages: usize) -> Vec<u8> {
    let mut data = b") HP-PCL XL;2;0;\r\n".to_vec();
    data.extend_from_slice(&[0xC0, 0x00, 0xF8, 0x86, 0x41]);
    for _ in 0..pages {
        data.push(0x43);
        for i in 0..500u16 {
            // Point = (i, i), SetCursor
            data.push(0xD1);
            data.extend_from_slice(&i.to_le_bytes());
            data.extend_from_slice(&i.to_le_bytes());
            data.extend_from_slice(&[0xF8, 0x4C, 0x6B]);
        }
        data.push(0x44);
    }
    data.push(0x42);
    data
}

fn bench_analyse(c: &mut Criterion) {
    let pcl = pcl_pages(20);
    let pclxl = pclxl_pages(20);

    let mut group = c.benchmark_group("analyse");

    group.throughput(Throughput::Bytes(pcl.len() as u64));
    group.bench_function("pcl_rows", |b| {
        b.iter(|| {
            let mut rows = Vec::new();
            analyse(&mut Cursor::new(black_box(&pcl)), &Options::default(), &mut rows).unwrap();
            rows
        });
    });

    group.throughput(Throughput::Bytes(pcl.len() as u64));
    group.bench_function("pcl_null_sink", |b| {
        b.iter(|| analyse(&mut Cursor::new(black_box(&pcl)), &Options::default(), &mut NullSink).unwrap());
    });

    group.throughput(Throughput::Bytes(pcl.len() as u64));
    group.bench_function("pcl_small_blocks", |b| {
        let options = Options::default().with_block_size(64);
        b.iter(|| analyse(&mut Cursor::new(black_box(&pcl)), &options, &mut NullSink).unwrap());
    });

    group.throughput(Throughput::Bytes(pclxl.len() as u64));
    group.bench_function("pclxl_null_sink", |b| {
        b.iter(|| analyse(&mut Cursor::new(black_box(&pclxl)), &Options::default(), &mut NullSink).unwrap());
    });

    group.throughput(Throughput::Bytes(pcl.len() as u64));
    group.bench_function("pcl_overlay", |b| {
        b.iter(|| {
            let mut output = Vec::with_capacity(pcl.len());
            make_overlay_pcl_stream(&mut Cursor::new(black_box(&pcl)), &mut output, &Options::default(), &PclOverlaySettings::default(), &mut NullSink).unwrap();
            output
        });
    });

    group.finish();
}

criterion_group!(name=analyse_benches; config=Criterion::default().with_plots(); targets=bench_analyse);
criterion_main!(analyse_benches);
