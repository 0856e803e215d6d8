//! End-to-end checks of tempo conversion, note lookups and template easings.

use chart_timeline::prelude::*;
use chart_timeline::time::beats;
use pretty_assertions::assert_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn tempo_change_halves_seconds_per_beat() {
    init_logger();
    let tempo = BpmSequence::new(
        &[
            BpmPoint::new(beats(0, 0, 1), 120.0).unwrap(),
            BpmPoint::new(beats(4, 0, 1), 240.0).unwrap(),
        ],
        beats(8, 0, 1),
        JumpConfig::default(),
    )
    .unwrap();
    assert_eq!(tempo.to_seconds(beats(4, 0, 1)), 2.0);
    assert_eq!(tempo.to_seconds(beats(8, 0, 1)), 3.0);
    assert_eq!(tempo.seconds_to_beats(2.0), 4.0);
    assert_eq!(tempo.seconds_to_beats(3.0), 8.0);
}

#[test]
fn hold_is_found_while_held() {
    init_logger();
    let mut holds = HNList::new(beats(8, 0, 1), JumpConfig::default());
    let (node, created) = holds.add_note(Note::hold(beats(2, 0, 1), beats(6, 0, 1)));
    assert!(created);
    assert_eq!(holds.get_node_at(beats(4, 0, 1), true), node);
    assert_eq!(
        holds.get_node_at(beats(4, 0, 1), false),
        holds.list().nodes().tail()
    );

    let mut taps = NNList::new(beats(8, 0, 1), JumpConfig::default());
    let (last, _) = taps.add_note(Note::tap(beats(2, 0, 1)));
    let found = taps.get_node_at(beats(4, 0, 1));
    assert_eq!(found, taps.nodes().tail());
    assert_eq!(taps.nodes().previous(found), Some(last));
}

/// 0 → 2 over [0, 1), 2 → 5 over [1, 2), 5 → 3 over [2, 4), then 3.
fn three_segments() -> EventNodeSequence<f64> {
    let record = SequenceRecord {
        events: vec![
            EventRecord {
                start_time: beats(0, 0, 1),
                end_time: beats(1, 0, 1),
                start: 0.0,
                end: 2.0,
                easing: EasingRecord::Normal {
                    id: NormalEasing::QuadOut.id(),
                },
            },
            EventRecord {
                start_time: beats(1, 0, 1),
                end_time: beats(2, 0, 1),
                start: 2.0,
                end: 5.0,
                easing: EasingRecord::default(),
            },
            EventRecord {
                start_time: beats(2, 0, 1),
                end_time: beats(4, 0, 1),
                start: 5.0,
                end: 3.0,
                easing: EasingRecord::Normal {
                    id: NormalEasing::SineIn.id(),
                },
            },
        ],
        final_value: None,
    };
    EventNodeSequence::from_records(
        &record,
        &TemplateEasingLib::new(),
        beats(8, 0, 1),
        JumpConfig::default(),
    )
    .unwrap()
}

fn sample(sequence: &EventNodeSequence<f64>) -> Vec<f64> {
    (0..=48)
        .map(|step| sequence.get_value_at(beats(0, step, 8), false))
        .collect()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < 1e-9, "sample {index}: {a} != {e}");
    }
}

#[test]
fn encapsulate_then_substitute_keeps_values() {
    init_logger();
    let mut sequence = three_segments();
    let original = sample(&sequence);
    let original_integral = sequence.get_integral(beats(5, 0, 1));

    let starts: Vec<_> = sequence.start_nodes().map(|(id, _)| id).collect();
    assert_eq!(starts.len(), 4);
    let to = sequence.end_of(starts[2]).unwrap();
    let mut library = TemplateEasingLib::new();
    let template = sequence
        .encapsulate(starts[0], to, "bounce", &mut library)
        .unwrap();
    assert_eq!(template.name(), "bounce");
    assert!(library.contains("bounce"));
    assert_eq!(sequence.segment_count(), 1);
    assert_close(&sample(&sequence), &original);

    sequence.substitute(starts[0]).unwrap();
    assert_eq!(sequence.segment_count(), 3);
    assert_close(&sample(&sequence), &original);
    let integral = sequence.get_integral(beats(5, 0, 1));
    assert!((integral - original_integral).abs() < 1e-9);

    let mut rebuilt = sequence.jump().clone();
    rebuilt.rebuild(sequence.nodes());
    assert_eq!(sequence.jump(), &rebuilt);
}

#[test]
fn chart_keeps_note_indices_consistent() {
    init_logger();
    let config = ChartConfig::default();
    let span = beats(32, 0, 1);
    let tempo = BpmSequence::new(
        &[BpmPoint::new(beats(0, 0, 1), 150.0).unwrap()],
        span,
        config.jump,
    )
    .unwrap();
    let mut chart = Chart::new(tempo, span, config);
    let lines = [chart.add_line("left"), chart.add_line("right")];
    let mut ids = Vec::new();
    for step in 0..64 {
        let line = lines[step % 2];
        let start = beats(0, step as i64, 2);
        let note = if step % 5 == 0 {
            Note::hold(start, start + beats(1, 0, 1))
        } else {
            Note::tap(start)
        };
        ids.push(chart.add_note(line, note).unwrap());
    }
    assert_eq!(chart.max_combo(), 64);
    assert_eq!(chart.combo_before(beats(8, 0, 1)), 16);

    for id in ids.iter().step_by(3) {
        assert!(chart.remove_note(*id).is_some());
    }
    let remaining = 64 - ids.iter().step_by(3).count();
    assert_eq!(chart.max_combo(), remaining);
    let ordered: Vec<_> = chart
        .notes_between(RationalTime::ZERO, span)
        .map(|note| note.start_time)
        .collect();
    assert_eq!(ordered.len(), remaining);
    assert!(ordered.windows(2).all(|pair| pair[0] <= pair[1]));
}
