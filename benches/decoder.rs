//! Benchmark suite for the payload decoder.
//!
//! These functions run once per received advertisement, so they are kept
//! free of async runtime overhead here.

use blueblue::{
    Advertisement, MacAddress, decode_proximity_beacon, format_raw_bytes, sanitize_name,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Manufacturer data of a proximity beacon, company id included.
fn beacon_manufacturer_data() -> Vec<u8> {
    vec![
        0x4C, 0x00, // Company identifier
        0x02, 0x15, // Beacon type and length
        0xE2, 0xC5, 0x6D, 0xB5, 0xDF, 0xFB, 0x48, 0xD2, // Identifier
        0xB0, 0x60, 0xD0, 0xF5, 0xA7, 0x10, 0x96, 0xE0, //
        0x00, //
        0x00, 0x01, // Major
        0x00, //
        0x00, 0x02, // Minor
        0x64, // Battery
    ]
}

/// Raw advertising payload: flags, complete name, beacon service data and
/// manufacturer data.
fn raw_advertisement() -> Vec<u8> {
    let mut raw = vec![0x02, 0x01, 0x06];
    raw.extend_from_slice(&[0x07, 0x09, b'B', b'e', b'a', b'c', b'o', b'n']);
    raw.extend_from_slice(&[0x04, 0x16, 0x03, 0x18, 0x01]);
    let manufacturer = beacon_manufacturer_data();
    raw.push(manufacturer.len() as u8 + 1);
    raw.push(0xFF);
    raw.extend_from_slice(&manufacturer);
    raw
}

fn bench_decode_beacon(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_proximity_beacon");
    let data = beacon_manufacturer_data();
    let short = &data[..20];

    group.throughput(Throughput::Elements(1));
    group.bench_function("valid", |b| {
        b.iter(|| decode_proximity_beacon(black_box(&data)))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| decode_proximity_beacon(black_box(short)))
    });

    group.finish();
}

fn bench_format_raw_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_raw_bytes");

    // Legacy advertising payloads top out at 31 bytes
    for len in [0usize, 8, 31] {
        let raw: Vec<u8> = (0..len as u8).collect();
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &raw, |b, raw| {
            b.iter(|| format_raw_bytes(black_box(raw)))
        });
    }

    group.finish();
}

fn bench_sanitize_name(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize_name");

    group.bench_function("clean", |b| {
        b.iter(|| sanitize_name(black_box("Kitchen Beacon")))
    });
    group.bench_function("padded", |b| {
        b.iter(|| sanitize_name(black_box("\u{0}\u{0}Kitchen Beacon\u{0}\u{0}\u{0}\u{0}")))
    });

    group.finish();
}

fn bench_parse_reports(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_reports");
    let adv = raw_advertisement();
    let scan_response = [0x05, 0x08, b'T', b'a', b'g', b'1'];

    group.throughput(Throughput::Elements(1));
    group.bench_function("advertisement_only", |b| {
        b.iter(|| Advertisement::from_reports(TEST_MAC, -60, black_box(&adv), &[]))
    });
    group.bench_function("with_scan_response", |b| {
        b.iter(|| {
            Advertisement::from_reports(TEST_MAC, -60, black_box(&adv), black_box(&scan_response))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_beacon,
    bench_format_raw_bytes,
    bench_sanitize_name,
    bench_parse_reports,
);
criterion_main!(benches);
