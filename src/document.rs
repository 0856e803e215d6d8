//! The persisted form of a chart.
//!
//! A [`ChartDocument`] is a plain serde tree: every sequence is stored as flat event records and
//! every time as a `[whole, numerator, denominator]` triple, so a chart survives a save and load
//! without losing precision. [`Chart::from_document`] validates the tree and builds every index;
//! [`Chart::to_document`] goes the other way.

use log::warn;

use crate::bpm::{BpmPoint, BpmSequence};
use crate::chart::{Chart, ChartMeta, EventKind, EventLayer, JudgeLine};
use crate::config::ChartConfig;
use crate::easing::{EasingRecord, TemplateEasing};
use crate::error::{EasingError, Result, TempoError};
use crate::event::records::SequenceRecord;
use crate::event::{EventNodeSequence, EventValue, Rgb};
use crate::note::{Note, NoteId, NoteType};
use crate::time::RationalTime;

/// A tempo change as stored.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BpmRecord {
    /// Where the tempo takes effect.
    pub time: RationalTime,
    /// Beats per minute from here on.
    pub bpm: f64,
}

/// A template easing as stored: a numeric sequence starting at beat 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TemplateRecord {
    /// The name segments refer to it by.
    pub name: String,
    /// The curve.
    pub events: SequenceRecord<f64>,
}

/// One animation layer as stored.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EventLayerRecord {
    /// Horizontal position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_x: Option<SequenceRecord<f64>>,
    /// Vertical position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_y: Option<SequenceRecord<f64>>,
    /// Rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<SequenceRecord<f64>>,
    /// Opacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<SequenceRecord<f64>>,
    /// Speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<SequenceRecord<f64>>,
}

impl EventLayerRecord {
    fn sequence(&self, kind: EventKind) -> Option<&SequenceRecord<f64>> {
        match kind {
            EventKind::MoveX => self.move_x.as_ref(),
            EventKind::MoveY => self.move_y.as_ref(),
            EventKind::Rotate => self.rotate.as_ref(),
            EventKind::Alpha => self.alpha.as_ref(),
            EventKind::Speed => self.speed.as_ref(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_one() -> f64 {
    1.0
}

const fn default_alpha() -> u8 {
    255
}

const fn default_visible_time() -> f64 {
    999_999.0
}

/// A note as stored. Ids are not persisted; loading assigns fresh ones.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NoteRecord {
    /// The kind of note.
    #[serde(default)]
    pub note_type: NoteType,
    /// When the note is hit.
    pub start_time: RationalTime,
    /// When a hold is released. Defaults to the start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<RationalTime>,
    /// Horizontal position along the line.
    #[serde(default)]
    pub position_x: f64,
    /// Whether the note falls from above.
    #[serde(default = "default_true")]
    pub above: bool,
    /// Speed multiplier.
    #[serde(default = "default_one")]
    pub speed: f64,
    /// Vertical offset from the line.
    #[serde(default)]
    pub y_offset: f64,
    /// Width multiplier.
    #[serde(default = "default_one")]
    pub size: f64,
    /// Opacity.
    #[serde(default = "default_alpha")]
    pub alpha: u8,
    /// Drawn but not judged.
    #[serde(default)]
    pub is_fake: bool,
    /// Seconds before its time the note becomes visible.
    #[serde(default = "default_visible_time")]
    pub visible_time: f64,
}

impl NoteRecord {
    fn to_note(&self) -> Note {
        Note {
            id: NoteId::default(),
            note_type: self.note_type,
            start_time: self.start_time,
            end_time: self.end_time.unwrap_or(self.start_time),
            position_x: self.position_x,
            above: self.above,
            speed: self.speed,
            y_offset: self.y_offset,
            size: self.size,
            alpha: self.alpha,
            is_fake: self.is_fake,
            visible_time: self.visible_time,
        }
    }
}

impl From<&Note> for NoteRecord {
    fn from(note: &Note) -> Self {
        Self {
            note_type: note.note_type,
            start_time: note.start_time,
            end_time: (note.end_time != note.start_time).then_some(note.end_time),
            position_x: note.position_x,
            above: note.above,
            speed: note.speed,
            y_offset: note.y_offset,
            size: note.size,
            alpha: note.alpha,
            is_fake: note.is_fake,
            visible_time: note.visible_time,
        }
    }
}

/// A judge line as stored.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct JudgeLineRecord {
    /// The line's name.
    pub name: String,
    /// Animation layers, bottom first.
    pub layers: Vec<EventLayerRecord>,
    /// Text shown instead of the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<SequenceRecord<String>>,
    /// The line's color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<SequenceRecord<Rgb>>,
    /// Notes, in any order.
    pub notes: Vec<NoteRecord>,
}

/// A whole chart as stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChartDocument {
    /// Descriptive data.
    #[serde(default)]
    pub meta: ChartMeta,
    /// Tempo changes. The first must be at beat 0.
    pub bpm: Vec<BpmRecord>,
    /// The span indices cover. Defaults to the configured span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_beats: Option<RationalTime>,
    /// Template easings, in any order.
    #[serde(default)]
    pub templates: Vec<TemplateRecord>,
    /// Judge lines.
    #[serde(default)]
    pub lines: Vec<JudgeLineRecord>,
}

fn template_names(record: &SequenceRecord<f64>) -> impl Iterator<Item = &str> {
    record
        .events
        .iter()
        .flat_map(|event| EasingRecord::template_names(&event.easing))
}

/// The end of the last event, the natural span of a template.
fn record_span<V>(record: &SequenceRecord<V>) -> RationalTime {
    record
        .events
        .iter()
        .map(|event| event.end_time)
        .max()
        .unwrap_or(RationalTime::ZERO)
}

impl Chart {
    /// Builds a chart from its document.
    ///
    /// Templates may refer to each other in any order, as long as the references do not form a
    /// cycle.
    ///
    /// # Errors
    ///
    /// Fails on an invalid tempo list, a malformed sequence, an unknown or cyclic template
    /// reference, or a reversed note.
    pub fn from_document(
        document: &ChartDocument,
        config: ChartConfig,
    ) -> Result<Self> {
        let effective_beats = document
            .effective_beats
            .unwrap_or(config.default_effective_beats);
        let points = document
            .bpm
            .iter()
            .map(|record| BpmPoint::new(record.time, record.bpm))
            .collect::<std::result::Result<Vec<_>, TempoError>>()?;
        let tempo = BpmSequence::new(&points, effective_beats, config.jump)?;
        let mut chart = Self::new(tempo, effective_beats, config);
        chart.meta_mut().clone_from(&document.meta);

        let mut pending: Vec<&TemplateRecord> = document.templates.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for template in pending {
                if template_names(&template.events).all(|name| chart.templates().contains(name)) {
                    let sequence = EventNodeSequence::from_records(
                        &template.events,
                        chart.templates(),
                        record_span(&template.events),
                        config.jump,
                    )?;
                    chart
                        .templates_mut()
                        .insert(TemplateEasing::new(template.name.clone(), sequence))?;
                } else {
                    blocked.push(template);
                }
            }
            if blocked.len() == before {
                let missing = blocked
                    .iter()
                    .flat_map(|template| template_names(&template.events))
                    .find(|name| !chart.templates().contains(name))
                    .unwrap_or_default()
                    .to_string();
                warn!("template easing `{missing}` is referenced but never defined, or cyclic");
                return Err(EasingError::UnknownTemplate(missing).into());
            }
            pending = blocked;
        }

        for record in &document.lines {
            let index = chart.add_line(record.name.clone());
            let mut layers = Vec::with_capacity(record.layers.len());
            for layer_record in &record.layers {
                let mut layer = EventLayer::default();
                for kind in EventKind::ALL {
                    if let Some(sequence) = layer_record.sequence(kind) {
                        layer.set_sequence(kind, chart.build_sequence(sequence)?);
                    }
                }
                layers.push(layer);
            }
            let text = record
                .text
                .as_ref()
                .map(|text| chart.build_sequence(text))
                .transpose()?;
            let color = record
                .color
                .as_ref()
                .map(|color| chart.build_sequence(color))
                .transpose()?;
            let line = chart.line_mut(index)?;
            for layer in layers {
                line.push_layer(layer);
            }
            line.set_text(text);
            line.set_color(color);
            for note in &record.notes {
                chart.add_note(index, note.to_note())?;
            }
        }
        Ok(chart)
    }

    fn build_sequence<V: EventValue>(
        &self,
        record: &SequenceRecord<V>,
    ) -> Result<EventNodeSequence<V>> {
        Ok(EventNodeSequence::from_records(
            record,
            self.templates(),
            self.effective_beats(),
            self.config().jump,
        )?)
    }

    /// Exports the chart as a document.
    #[must_use]
    pub fn to_document(&self) -> ChartDocument {
        ChartDocument {
            meta: self.meta().clone(),
            bpm: self
                .tempo()
                .points()
                .into_iter()
                .map(|point| BpmRecord {
                    time: point.time,
                    bpm: point.bpm.as_f64(),
                })
                .collect(),
            effective_beats: Some(self.effective_beats()),
            templates: self
                .templates()
                .iter()
                .map(|(name, template)| TemplateRecord {
                    name: name.to_string(),
                    events: template.sequence().to_record(),
                })
                .collect(),
            lines: self.lines().iter().map(line_record).collect(),
        }
    }

    /// Parses a JSON document and builds the chart.
    ///
    /// # Errors
    ///
    /// Fails with [`ChartError::Json`](crate::error::ChartError::Json), carrying the path to the offending value, if the text is
    /// not a valid document, and like [`Self::from_document`] otherwise.
    #[cfg(feature = "json")]
    pub fn from_json_str(source: &str, config: ChartConfig) -> Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(source);
        let document: ChartDocument = serde_path_to_error::deserialize(&mut deserializer)?;
        Self::from_document(&document, config)
    }
}

fn line_record(line: &JudgeLine) -> JudgeLineRecord {
    JudgeLineRecord {
        name: line.name().to_string(),
        layers: line
            .layers()
            .iter()
            .map(|layer| EventLayerRecord {
                move_x: layer.move_x.as_ref().map(EventNodeSequence::to_record),
                move_y: layer.move_y.as_ref().map(EventNodeSequence::to_record),
                rotate: layer.rotate.as_ref().map(EventNodeSequence::to_record),
                alpha: layer.alpha.as_ref().map(EventNodeSequence::to_record),
                speed: layer.speed.as_ref().map(EventNodeSequence::to_record),
            })
            .collect(),
        text: line.text().map(EventNodeSequence::to_record),
        color: line.color().map(EventNodeSequence::to_record),
        notes: line.notes().map(NoteRecord::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChartError;
    use crate::event::records::EventRecord;
    use crate::time::beats;
    use pretty_assertions::assert_eq;

    fn ramp(from: f64, to: f64, easing: EasingRecord) -> SequenceRecord<f64> {
        SequenceRecord {
            events: vec![EventRecord {
                start_time: RationalTime::ZERO,
                end_time: beats(1, 0, 1),
                start: from,
                end: to,
                easing,
            }],
            final_value: None,
        }
    }

    fn document() -> ChartDocument {
        ChartDocument {
            meta: ChartMeta {
                name: "test".to_string(),
                ..ChartMeta::default()
            },
            bpm: vec![
                BpmRecord {
                    time: RationalTime::ZERO,
                    bpm: 120.0,
                },
                BpmRecord {
                    time: beats(4, 0, 1),
                    bpm: 240.0,
                },
            ],
            effective_beats: Some(beats(8, 0, 1)),
            // Listed before the template it uses.
            templates: vec![
                TemplateRecord {
                    name: "outer".to_string(),
                    events: ramp(
                        0.0,
                        1.0,
                        EasingRecord::Template {
                            name: "inner".to_string(),
                        },
                    ),
                },
                TemplateRecord {
                    name: "inner".to_string(),
                    events: ramp(0.0, 1.0, EasingRecord::default()),
                },
            ],
            lines: vec![JudgeLineRecord {
                name: "main".to_string(),
                layers: vec![EventLayerRecord {
                    move_x: Some(ramp(
                        0.0,
                        10.0,
                        EasingRecord::Template {
                            name: "outer".to_string(),
                        },
                    )),
                    ..EventLayerRecord::default()
                }],
                notes: vec![
                    NoteRecord::from(&Note::tap(beats(1, 0, 1))),
                    NoteRecord::from(&Note::hold(beats(2, 0, 1), beats(3, 0, 1))),
                ],
                ..JudgeLineRecord::default()
            }],
        }
    }

    #[test]
    fn test_templates_resolve_in_any_order() {
        let chart = Chart::from_document(&document(), ChartConfig::default()).unwrap();
        assert_eq!(chart.templates().len(), 2);
        let line = chart.line(0).unwrap();
        let value = line.value_at(EventKind::MoveX, beats(0, 1, 2));
        assert!((value - 5.0).abs() < 1e-9, "{value}");
        assert_eq!(chart.max_combo(), 2);
        assert!((chart.seconds_at(beats(8, 0, 1)) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_document_round_trip() {
        let document = document();
        let chart = Chart::from_document(&document, ChartConfig::default()).unwrap();
        let exported = chart.to_document();
        assert_eq!(exported.meta, document.meta);
        assert_eq!(exported.bpm, document.bpm);
        assert_eq!(exported.lines, document.lines);
        let mut names: Vec<_> = exported.templates.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["inner", "outer"]);
    }

    #[test]
    fn test_unknown_template() {
        let mut document = document();
        document.templates.remove(1);
        assert!(matches!(
            Chart::from_document(&document, ChartConfig::default()),
            Err(ChartError::Easing(EasingError::UnknownTemplate(name))) if name == "inner"
        ));
    }

    #[test]
    fn test_invalid_tempo() {
        let mut document = document();
        document.bpm[1].bpm = -1.0;
        assert!(matches!(
            Chart::from_document(&document, ChartConfig::default()),
            Err(ChartError::Tempo(TempoError::InvalidBpm(_)))
        ));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_error_has_path() {
        let source = r#"{ "bpm": [{ "time": [0, 0, 1], "bpm": "fast" }] }"#;
        let Err(ChartError::Json(error)) = Chart::from_json_str(source, ChartConfig::default())
        else {
            panic!("expected a json error");
        };
        assert_eq!(error.path().to_string(), "bpm[0].bpm");
    }
}
