use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use waveserver::mseed::{self, MseedReader, MseedRecord, NanoTime, Samples};
use waveserver::{MergePolicy, Segment, Waveform, unpack};

const T0: i64 = 1_704_067_200_000_000;
const RATE: f64 = 100.0;

/// Smooth seismic-like trace with small sample-to-sample differences.
fn seismic_samples(n: usize, offset: usize) -> Vec<i32> {
    (offset..offset + n)
        .map(|i| {
            let drift = (i as f64 * 0.05).sin() * 50.0;
            let noise = ((i as f64 * 1.7).sin() * 10.0) as i32;
            1000 + drift as i32 + noise
        })
        .collect()
}

/// `seconds` one-second records, alternating v2 and v3, in reverse order.
fn record_stream(seconds: usize) -> Vec<u8> {
    let per_record = RATE as usize;
    let mut stream = Vec::new();
    for i in (0..seconds).rev() {
        let start = NanoTime::from_epoch_micros(T0 + i as i64 * 1_000_000).unwrap();
        let base = if i % 2 == 0 {
            MseedRecord::new()
        } else {
            MseedRecord::new_v3()
        };
        let record = base
            .with_nslc("UU", "FORK", "01", "HHZ")
            .with_start_time(start)
            .with_sample_rate(RATE)
            .with_samples(Samples::Int(seismic_samples(per_record, i * per_record)));
        stream.extend(mseed::encode(&record).unwrap());
    }
    stream
}

fn bench_decode(c: &mut Criterion) {
    let v2 = record_stream(1);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(RATE as u64));
    group.bench_function("v2/int32/100samp", |b| {
        b.iter(|| mseed::decode(black_box(&v2)).unwrap())
    });
    group.finish();
}

fn bench_reader(c: &mut Criterion) {
    let stream = record_stream(60);

    let mut group = c.benchmark_group("reader");
    group.throughput(Throughput::Elements(60));
    group.bench_function("60_records", |b| {
        b.iter(|| {
            MseedReader::new(black_box(&stream))
                .filter_map(Result::ok)
                .count()
        })
    });
    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let stream = record_stream(60);

    let mut group = c.benchmark_group("unpack");
    group.throughput(Throughput::Elements(60 * RATE as u64));
    group.bench_function("60s/unmerged", |b| {
        b.iter(|| unpack(black_box(&stream)).unwrap())
    });
    group.bench_function("60s/merged", |b| {
        b.iter(|| {
            let mut waveform = unpack(black_box(&stream)).unwrap();
            waveform.merge_segments();
            waveform
        })
    });
    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    // One-second segments with a real gap every tenth boundary.
    let mut gappy = Waveform::new();
    for i in 0..600i64 {
        let start = T0 + i * 1_000_000 + (i / 10) * 500_000;
        let segment = Segment::from_parts(start, RATE, seismic_samples(100, 0)).unwrap();
        gappy.add_segment(segment).unwrap();
    }
    let policy = MergePolicy::default();

    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(600));
    group.bench_function("600_segments", |b| {
        b.iter(|| {
            let mut waveform = gappy.clone();
            waveform.merge_segments_with(black_box(&policy)).unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_decode, bench_reader, bench_unpack, bench_merge);
criterion_main!(benches);
