//! Benchmark suite for the per-sink formatters.
//!
//! Isolates formatting cost from async runtime overhead: the pretty line,
//! the Influx line protocol and the JSON wire format.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use switchbot_listener::Reading;
use switchbot_listener::sink::influx::format_line;
use switchbot_listener::sink::pretty::format_reading;

/// Reading as a plain meter produces it (no light).
fn sensor_reading() -> Reading {
    Reading {
        time: Some(1_000_000_000),
        location: "green house".to_string(),
        id: "gh-01".to_string(),
        rssi: Some(-60),
        temp: Some(2.5),
        humidity: Some(44),
        light: None,
        co2_ppm: None,
        voc_index: None,
    }
}

/// Reading as a hub produces it (light present).
fn hub_reading() -> Reading {
    Reading {
        time: Some(1_000_000_000),
        location: "living room".to_string(),
        id: "hub2".to_string(),
        rssi: Some(-48),
        temp: Some(21.0),
        humidity: Some(48),
        light: Some(30),
        co2_ppm: None,
        voc_index: None,
    }
}

fn bench_pretty_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("pretty_format");
    group.throughput(Throughput::Elements(1));

    let sensor = sensor_reading();
    group.bench_function("sensor", |b| {
        b.iter(|| black_box(format_reading(black_box(&sensor))))
    });

    let hub = hub_reading();
    group.bench_function("hub", |b| {
        b.iter(|| black_box(format_reading(black_box(&hub))))
    });

    group.finish();
}

fn bench_influx_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("influx_format");
    group.throughput(Throughput::Elements(1));

    let sensor = sensor_reading();
    group.bench_function("sensor", |b| {
        b.iter(|| black_box(format_line(black_box(&sensor))))
    });

    let hub = hub_reading();
    group.bench_function("hub", |b| {
        b.iter(|| black_box(format_line(black_box(&hub))))
    });

    // Tag escaping is the only string-rewriting path in the formatter.
    let mut escaped = hub_reading();
    escaped.location = "living room, ground=floor".to_string();
    group.bench_function("escaped_tags", |b| {
        b.iter(|| black_box(format_line(black_box(&escaped))))
    });

    group.finish();
}

fn bench_json_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_format");
    group.throughput(Throughput::Elements(1));

    let hub = hub_reading();
    group.bench_function("serialize", |b| {
        b.iter(|| black_box(serde_json::to_string(black_box(&hub)).unwrap()))
    });

    let line = serde_json::to_string(&hub).unwrap();
    group.bench_function("parse", |b| {
        b.iter(|| black_box(serde_json::from_str::<Reading>(black_box(&line)).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_pretty_format,
    bench_influx_format,
    bench_json_format,
);
criterion_main!(benches);
