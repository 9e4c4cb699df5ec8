//! Sample format conversion and playback benchmarks
//!
//! Run with: cargo bench -p r4w-sigmf --bench codec_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use r4w_sigmf::prelude::*;
use r4w_sigmf::convert;
use tempfile::TempDir;

const SAMPLES: usize = 65_536;

fn tone(n: usize) -> Vec<Complex64> {
    (0..n)
        .map(|i| Complex64::from_polar(0.8, 0.01 * i as f64))
        .collect()
}

fn bench_convert(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert");
    group.throughput(Throughput::Elements(SAMPLES as u64));

    let signal = tone(SAMPLES);
    let pairs = [
        (SampleFormat::Cf32, SampleFormat::Cf32),
        (SampleFormat::Cf32, SampleFormat::Ci16),
        (SampleFormat::Ci16, SampleFormat::Cf32),
        (SampleFormat::Ci32, SampleFormat::Ci8),
        (SampleFormat::Ci8, SampleFormat::Cf32),
    ];

    for (from, to) in pairs {
        let data = from.encode_complex(&signal);
        group.bench_with_input(
            BenchmarkId::new(format!("{from}"), to),
            &data,
            |b, data| b.iter(|| convert(black_box(data), from, to)),
        );
    }

    group.finish();
}

fn bench_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback");
    group.throughput(Throughput::Elements(SAMPLES as u64));

    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("bench");
    let mut sink = RecordingSink::create(&base, SinkConfig::new(SampleFormat::Ci16)).unwrap();
    let tags: Vec<PositionalTag> = (0..SAMPLES as u64)
        .step_by(1024)
        .map(|offset| PositionalTag::new(offset, "core:label", "block"))
        .collect();
    sink.write_complex(&tone(SAMPLES), &tags).unwrap();
    sink.close().unwrap();

    for chunk in [256usize, 4096, SAMPLES] {
        group.bench_with_input(BenchmarkId::new("ci16_to_cf32", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut source =
                    RecordingSource::open(&base, SourceConfig::new(SampleFormat::Cf32)).unwrap();
                let mut total = 0;
                loop {
                    let c = source.read(chunk).unwrap();
                    if c.end_of_stream {
                        break;
                    }
                    total += c.samples;
                }
                black_box(total)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_convert, bench_playback);
criterion_main!(benches);
