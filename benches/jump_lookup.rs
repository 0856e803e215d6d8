//! Benchmark for indexed lookups on event sequences and note lists.

use chart_timeline::prelude::*;
use chart_timeline::time::beats;
use criterion::{BenchmarkId, Criterion, Throughput};
use num::rational::Ratio;

const QUERIES: i64 = 1024;

/// A sequence with `segments` linear segments, one every `1 / density` beats.
fn dense_sequence(segments: i64, density: i64) -> EventNodeSequence<f64> {
    let span = beats(0, segments, density);
    let mut sequence = EventNodeSequence::new(0.0, span, JumpConfig::default());
    for index in 1..segments {
        let value = (index % 7) as f64;
        // Appending behind the last segment always succeeds.
        let _ = sequence.insert_at(EventPair::new(
            beats(0, index, density),
            value,
            value,
            Easing::LINEAR,
        ));
    }
    sequence
}

fn queries(span: RationalTime) -> Vec<RationalTime> {
    (0..QUERIES)
        .map(|step| span.scale(Ratio::new(step, QUERIES)))
        .collect()
}

fn bench_sequence_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_lookup");
    group.throughput(Throughput::Elements(QUERIES as u64));

    for segments in [64, 1024, 16384] {
        let sequence = dense_sequence(segments, 4);
        let times = queries(sequence.effective_beats());
        group.bench_with_input(BenchmarkId::from_parameter(segments), &times, |b, times| {
            b.iter(|| {
                for time in times {
                    std::hint::black_box(sequence.get_value_at(std::hint::black_box(*time), false));
                }
            });
        });
    }

    group.finish();
}

fn bench_note_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("note_lookup");
    group.throughput(Throughput::Elements(QUERIES as u64));

    for notes in [64, 1024, 16384] {
        let span = beats(0, notes, 8);
        let mut list = NNList::new(span, JumpConfig::default());
        for index in 0..notes {
            let mut note = Note::tap(beats(0, index, 8));
            note.id = NoteId(index as u64);
            list.add_note(note);
        }
        let times = queries(span);
        group.bench_with_input(BenchmarkId::from_parameter(notes), &times, |b, times| {
            b.iter(|| {
                for time in times {
                    std::hint::black_box(list.get_node_at(std::hint::black_box(*time)));
                }
            });
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_insert");

    for segments in [64, 1024] {
        group.bench_function(BenchmarkId::from_parameter(segments), |b| {
            b.iter(|| std::hint::black_box(dense_sequence(segments, 4)));
        });
    }

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default();
    bench_sequence_lookup(&mut criterion);
    bench_note_lookup(&mut criterion);
    bench_insert(&mut criterion);
}
