//! Fabric hot-path benchmarks: sequence assignment and ring round trips

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use osprey_core::core::{ManualClock, SequencedMessage, Venue};
use osprey_core::fabric::{self, MpscSequencer, SpscSequencer, TimestampSequencer};
use std::sync::Arc;

fn bench_sequencers(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencer");
    group.throughput(Throughput::Elements(1));

    let spsc = SpscSequencer::new();
    group.bench_function("spsc_next", |b| {
        b.iter(|| black_box(spsc.next()));
    });

    group.bench_function("spsc_next_commit", |b| {
        b.iter(|| {
            let seq = spsc.next();
            spsc.commit(seq);
            black_box(seq)
        });
    });

    let mpsc = MpscSequencer::new();
    group.bench_function("mpsc_claim_commit", |b| {
        b.iter(|| {
            let seq = mpsc.claim();
            mpsc.commit(seq);
            black_box(seq)
        });
    });

    let stamped = TimestampSequencer::new();
    group.bench_function("timestamped_next", |b| {
        b.iter(|| black_box(stamped.next()));
    });

    group.finish();
}

fn bench_spsc_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_ring");
    group.throughput(Throughput::Elements(1));

    let ring = fabric::spsc_ring(4_096);
    let msg = SequencedMessage::market_tick(Venue::Binance, 1, 100, 1, 101, 1);

    group.bench_function("write_read", |b| {
        b.iter(|| {
            ring.write(black_box(msg));
            black_box(ring.read())
        });
    });

    let sequencer = Arc::new(SpscSequencer::new());
    let clock = Arc::new(ManualClock::new(1));
    let sequenced = fabric::spsc_ring_with_sequencer(4_096, sequencer, clock);
    group.bench_function("write_read_sequenced", |b| {
        b.iter(|| {
            sequenced.write(black_box(msg));
            black_box(sequenced.read())
        });
    });

    group.bench_function("batch_64", |b| {
        let batch = vec![msg; 64];
        let mut out = vec![SequencedMessage::default(); 64];
        b.iter(|| {
            ring.write_batch(black_box(&batch));
            black_box(ring.read_batch(&mut out))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sequencers, bench_spsc_ring);
criterion_main!(benches);
