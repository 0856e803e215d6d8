//! Judge lines and the chart owning them.
//!
//! A [`Chart`] owns the tempo map, the template easing library, every [`JudgeLine`] and the
//! chart-wide [`NNNList`]. Notes are added and removed through the chart so that a line's note
//! lists and the chart-wide list stay in step.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use itertools::Itertools;
use log::warn;

use crate::bpm::BpmSequence;
use crate::config::{ChartConfig, JumpConfig};
use crate::easing::{TemplateEasing, TemplateEasingLib};
use crate::error::{ChartError, Result};
use crate::event::{EventNodeSequence, Rgb};
use crate::node_list::NodeId;
use crate::note::{
    HNList, NNList, NNNList, Note, NoteId, NoteListKey, NoteNode, NoteNodeRef, RemovedNote,
};
use crate::time::RationalTime;

/// The numeric properties a judge line animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKind {
    /// Horizontal position.
    MoveX,
    /// Vertical position.
    MoveY,
    /// Rotation in degrees.
    Rotate,
    /// Opacity.
    Alpha,
    /// Speed of the notes falling onto the line.
    Speed,
}

impl EventKind {
    /// Every kind.
    pub const ALL: [Self; 5] = [
        Self::MoveX,
        Self::MoveY,
        Self::Rotate,
        Self::Alpha,
        Self::Speed,
    ];
}

/// One layer of a judge line's animation. Values of all layers add up.
#[derive(Debug, Clone, Default)]
pub struct EventLayer {
    /// Horizontal position.
    pub move_x: Option<EventNodeSequence<f64>>,
    /// Vertical position.
    pub move_y: Option<EventNodeSequence<f64>>,
    /// Rotation.
    pub rotate: Option<EventNodeSequence<f64>>,
    /// Opacity.
    pub alpha: Option<EventNodeSequence<f64>>,
    /// Speed.
    pub speed: Option<EventNodeSequence<f64>>,
}

impl EventLayer {
    /// The sequence animating `kind`, if this layer has one.
    #[must_use]
    pub const fn sequence(&self, kind: EventKind) -> Option<&EventNodeSequence<f64>> {
        match kind {
            EventKind::MoveX => self.move_x.as_ref(),
            EventKind::MoveY => self.move_y.as_ref(),
            EventKind::Rotate => self.rotate.as_ref(),
            EventKind::Alpha => self.alpha.as_ref(),
            EventKind::Speed => self.speed.as_ref(),
        }
    }

    /// The sequence animating `kind`, mutably.
    pub const fn sequence_mut(&mut self, kind: EventKind) -> Option<&mut EventNodeSequence<f64>> {
        match kind {
            EventKind::MoveX => self.move_x.as_mut(),
            EventKind::MoveY => self.move_y.as_mut(),
            EventKind::Rotate => self.rotate.as_mut(),
            EventKind::Alpha => self.alpha.as_mut(),
            EventKind::Speed => self.speed.as_mut(),
        }
    }

    /// Sets the sequence animating `kind`, returning the previous one.
    pub fn set_sequence(
        &mut self,
        kind: EventKind,
        sequence: EventNodeSequence<f64>,
    ) -> Option<EventNodeSequence<f64>> {
        let slot = match kind {
            EventKind::MoveX => &mut self.move_x,
            EventKind::MoveY => &mut self.move_y,
            EventKind::Rotate => &mut self.rotate,
            EventKind::Alpha => &mut self.alpha,
            EventKind::Speed => &mut self.speed,
        };
        slot.replace(sequence)
    }

    fn sequences_mut(&mut self) -> impl Iterator<Item = &mut EventNodeSequence<f64>> {
        [
            &mut self.move_x,
            &mut self.move_y,
            &mut self.rotate,
            &mut self.alpha,
            &mut self.speed,
        ]
        .into_iter()
        .flatten()
    }
}

/// A line notes fall onto, with its animation and notes.
#[derive(Debug, Clone)]
pub struct JudgeLine {
    name: String,
    layers: Vec<EventLayer>,
    text: Option<EventNodeSequence<String>>,
    color: Option<EventNodeSequence<Rgb>>,
    nn_lists: BTreeMap<NoteListKey, NNList>,
    hn_lists: BTreeMap<NoteListKey, HNList>,
    effective_beats: RationalTime,
    jump_config: JumpConfig,
}

impl JudgeLine {
    /// An empty line.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        effective_beats: RationalTime,
        jump_config: JumpConfig,
    ) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
            text: None,
            color: None,
            nn_lists: BTreeMap::new(),
            hn_lists: BTreeMap::new(),
            effective_beats,
            jump_config,
        }
    }

    /// The line's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The animation layers, bottom first.
    #[must_use]
    pub fn layers(&self) -> &[EventLayer] {
        &self.layers
    }

    /// The animation layer at `index`.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut EventLayer> {
        self.layers.get_mut(index)
    }

    /// Appends an animation layer and returns its index.
    pub fn push_layer(&mut self, layer: EventLayer) -> usize {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// The text shown instead of the line, if any.
    #[must_use]
    pub const fn text(&self) -> Option<&EventNodeSequence<String>> {
        self.text.as_ref()
    }

    /// Sets the text sequence.
    pub fn set_text(&mut self, text: Option<EventNodeSequence<String>>) {
        self.text = text;
    }

    /// The line's color, if animated.
    #[must_use]
    pub const fn color(&self) -> Option<&EventNodeSequence<Rgb>> {
        self.color.as_ref()
    }

    /// Sets the color sequence.
    pub fn set_color(&mut self, color: Option<EventNodeSequence<Rgb>>) {
        self.color = color;
    }

    /// The sum over all layers of `kind` at `beats`. Layers without such a sequence add 0.
    #[must_use]
    pub fn value_at(&self, kind: EventKind, beats: RationalTime) -> f64 {
        self.layers
            .iter()
            .filter_map(|layer| layer.sequence(kind))
            .map(|sequence| sequence.get_value_at(beats, false))
            .sum()
    }

    /// How far the floor has scrolled at `beats`: the integral of the speed over beats, summed
    /// over layers.
    #[must_use]
    pub fn floor_position_at(&self, beats: RationalTime) -> f64 {
        self.layers
            .iter()
            .filter_map(|layer| layer.speed.as_ref())
            .map(|speed| speed.get_integral(beats))
            .sum()
    }

    /// The text at `beats`.
    #[must_use]
    pub fn text_at(&self, beats: RationalTime) -> Option<String> {
        self.text
            .as_ref()
            .map(|text| text.get_value_at(beats, false))
    }

    /// The color at `beats`.
    #[must_use]
    pub fn color_at(&self, beats: RationalTime) -> Option<Rgb> {
        self.color
            .as_ref()
            .map(|color| color.get_value_at(beats, false))
    }

    /// The list of taps, flicks and drags with `key`.
    #[must_use]
    pub fn nn_list(&self, key: NoteListKey) -> Option<&NNList> {
        self.nn_lists.get(&key)
    }

    /// The list of holds with `key`.
    #[must_use]
    pub fn hn_list(&self, key: NoteListKey) -> Option<&HNList> {
        self.hn_lists.get(&key)
    }

    /// Every non-hold list, by key.
    pub fn nn_lists(&self) -> impl Iterator<Item = (&NoteListKey, &NNList)> {
        self.nn_lists.iter()
    }

    /// Every hold list, by key.
    pub fn hn_lists(&self) -> impl Iterator<Item = (&NoteListKey, &HNList)> {
        self.hn_lists.iter()
    }

    /// Number of notes on the line.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.nn_lists.values().map(NNList::note_count).sum::<usize>()
            + self
                .hn_lists
                .values()
                .map(|holds| holds.list().note_count())
                .sum::<usize>()
    }

    /// Every note on the line, ordered by start time.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.nn_lists
            .values()
            .chain(self.hn_lists.values().map(HNList::list))
            .map(|list| list.nodes().iter().flat_map(|(_, node)| node.notes()))
            .kmerge_by(|a, b| a.start_time < b.start_time)
    }

    /// The note `id` starting at `start_time` in the list `key`.
    #[must_use]
    pub fn note(
        &self,
        key: NoteListKey,
        hold: bool,
        id: NoteId,
        start_time: RationalTime,
    ) -> Option<&Note> {
        let list = if hold {
            self.hn_lists.get(&key).map(HNList::list)
        } else {
            self.nn_lists.get(&key)
        }?;
        let node = list.node(list.get_node_at(start_time))?;
        node.notes().iter().find(|note| note.id == id)
    }

    fn add_note(&mut self, note: Note) -> (NodeId, bool) {
        let key = note.list_key();
        let (effective_beats, config) = (self.effective_beats, self.jump_config);
        if note.is_hold() {
            self.hn_lists
                .entry(key)
                .or_insert_with(|| HNList::new(effective_beats, config))
                .add_note(note)
        } else {
            self.nn_lists
                .entry(key)
                .or_insert_with(|| NNList::new(effective_beats, config))
                .add_note(note)
        }
    }

    fn remove_note(
        &mut self,
        key: NoteListKey,
        hold: bool,
        id: NoteId,
        start_time: RationalTime,
    ) -> Option<RemovedNote> {
        if hold {
            let list = self.hn_lists.get_mut(&key)?;
            let removed = list.remove_note(id, start_time);
            if list.list().is_empty() {
                self.hn_lists.remove(&key);
            }
            removed
        } else {
            let list = self.nn_lists.get_mut(&key)?;
            let removed = list.remove_note(id, start_time);
            if list.is_empty() {
                self.nn_lists.remove(&key);
            }
            removed
        }
    }

    fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.effective_beats = effective_beats;
        for sequence in self.layers.iter_mut().flat_map(EventLayer::sequences_mut) {
            sequence.set_effective_beats(effective_beats);
        }
        if let Some(text) = &mut self.text {
            text.set_effective_beats(effective_beats);
        }
        if let Some(color) = &mut self.color {
            color.set_effective_beats(effective_beats);
        }
        for list in self.nn_lists.values_mut() {
            list.set_effective_beats(effective_beats);
        }
        for list in self.hn_lists.values_mut() {
            list.set_effective_beats(effective_beats);
        }
    }
}

/// Descriptive data of a chart.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChartMeta {
    /// Title of the song.
    pub name: String,
    /// Who wrote the song.
    pub composer: String,
    /// Who wrote the chart.
    pub charter: String,
    /// Difficulty label.
    pub level: String,
    /// Seconds the music is delayed relative to beat 0.
    pub offset: f64,
}

/// Where a note lives.
#[derive(Debug, Clone, Copy, PartialEq)]
struct NoteLocation {
    line: usize,
    key: NoteListKey,
    hold: bool,
    start_time: RationalTime,
}

/// A whole chart.
#[derive(Debug, Clone)]
pub struct Chart {
    meta: ChartMeta,
    tempo: BpmSequence,
    effective_beats: RationalTime,
    lines: Vec<JudgeLine>,
    templates: TemplateEasingLib,
    nnn: NNNList,
    config: ChartConfig,
    next_note_id: u64,
    locations: HashMap<NoteId, NoteLocation>,
}

impl Chart {
    /// An empty chart with the tempo map `tempo`, indexing `[0, effective_beats)`.
    #[must_use]
    pub fn new(tempo: BpmSequence, effective_beats: RationalTime, config: ChartConfig) -> Self {
        Self {
            meta: ChartMeta::default(),
            tempo,
            effective_beats,
            lines: Vec::new(),
            templates: TemplateEasingLib::new(),
            nnn: NNNList::new(effective_beats, config.jump),
            config,
            next_note_id: 0,
            locations: HashMap::new(),
        }
    }

    /// Descriptive data.
    #[must_use]
    pub const fn meta(&self) -> &ChartMeta {
        &self.meta
    }

    /// Descriptive data, mutably.
    pub const fn meta_mut(&mut self) -> &mut ChartMeta {
        &mut self.meta
    }

    /// The settings the chart builds its indices with.
    #[must_use]
    pub const fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// The tempo map.
    #[must_use]
    pub const fn tempo(&self) -> &BpmSequence {
        &self.tempo
    }

    /// The tempo map, mutably.
    pub const fn tempo_mut(&mut self) -> &mut BpmSequence {
        &mut self.tempo
    }

    /// The span every index covers.
    #[must_use]
    pub const fn effective_beats(&self) -> RationalTime {
        self.effective_beats
    }

    /// Changes the span every index covers and rebuilds them all.
    pub fn set_effective_beats(&mut self, effective_beats: RationalTime) {
        self.effective_beats = effective_beats;
        self.tempo.set_effective_beats(effective_beats);
        self.nnn.set_effective_beats(effective_beats);
        for line in &mut self.lines {
            line.set_effective_beats(effective_beats);
        }
    }

    /// The template easings.
    #[must_use]
    pub const fn templates(&self) -> &TemplateEasingLib {
        &self.templates
    }

    /// The template easings, mutably.
    pub const fn templates_mut(&mut self) -> &mut TemplateEasingLib {
        &mut self.templates
    }

    /// The note nodes of every line grouped by start time.
    #[must_use]
    pub const fn nnn(&self) -> &NNNList {
        &self.nnn
    }

    /// The judge lines.
    #[must_use]
    pub fn lines(&self) -> &[JudgeLine] {
        &self.lines
    }

    /// The judge line at `index`.
    ///
    /// # Errors
    ///
    /// Fails with [`ChartError::UnknownLine`] if there is no such line.
    pub fn line(&self, index: usize) -> Result<&JudgeLine> {
        self.lines.get(index).ok_or(ChartError::UnknownLine(index))
    }

    /// The judge line at `index`, mutably.
    ///
    /// Notes must be edited through [`Self::add_note`] and [`Self::remove_note`].
    ///
    /// # Errors
    ///
    /// Fails with [`ChartError::UnknownLine`] if there is no such line.
    pub fn line_mut(&mut self, index: usize) -> Result<&mut JudgeLine> {
        self.lines
            .get_mut(index)
            .ok_or(ChartError::UnknownLine(index))
    }

    /// Adds an empty judge line and returns its index.
    pub fn add_line(&mut self, name: impl Into<String>) -> usize {
        self.lines.push(JudgeLine::new(
            name,
            self.effective_beats,
            self.config.jump,
        ));
        self.lines.len() - 1
    }

    /// Adds `note` to the line `line`, assigning it a fresh id.
    ///
    /// # Errors
    ///
    /// Fails if the line does not exist or the note ends before it starts.
    pub fn add_note(&mut self, line: usize, mut note: Note) -> Result<NoteId> {
        if note.end_time < note.start_time {
            return Err(ChartError::ReversedNote {
                start: note.start_time,
                end: note.end_time,
            });
        }
        if line >= self.lines.len() {
            return Err(ChartError::UnknownLine(line));
        }
        let id = NoteId(self.next_note_id);
        self.next_note_id += 1;
        note.id = id;
        self.place_note(line, note)?;
        Ok(id)
    }

    /// Files a note that already has its id into the line's lists and the chart-wide list.
    fn place_note(&mut self, line: usize, note: Note) -> Result<()> {
        let judge_line = self
            .lines
            .get_mut(line)
            .ok_or(ChartError::UnknownLine(line))?;
        let id = note.id;
        let location = NoteLocation {
            line,
            key: note.list_key(),
            hold: note.is_hold(),
            start_time: note.start_time,
        };
        let (node, created) = judge_line.add_note(note);
        if created {
            self.nnn.add_ref(
                location.start_time,
                NoteNodeRef {
                    line,
                    key: location.key,
                    hold: location.hold,
                    node,
                },
            );
        }
        self.locations.insert(id, location);
        Ok(())
    }

    /// Removes the note `id`, returning it.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let location = self.locations.remove(&id)?;
        let removed = self.lines.get_mut(location.line)?.remove_note(
            location.key,
            location.hold,
            id,
            location.start_time,
        );
        let Some(removed) = removed else {
            warn!("note {id:?} was registered but not found on line {}", location.line);
            return None;
        };
        if removed.node_removed {
            self.nnn.remove_ref(
                location.start_time,
                &NoteNodeRef {
                    line: location.line,
                    key: location.key,
                    hold: location.hold,
                    node: removed.node,
                },
            );
        }
        Some(removed.note)
    }

    /// Moves the note `id` to `[start_time, end_time]`, keeping its id.
    ///
    /// Returns whether the note exists.
    ///
    /// # Errors
    ///
    /// Fails if the note would end before it starts. The note is left untouched then.
    pub fn set_note_time(
        &mut self,
        id: NoteId,
        start_time: RationalTime,
        end_time: RationalTime,
    ) -> Result<bool> {
        if end_time < start_time {
            return Err(ChartError::ReversedNote {
                start: start_time,
                end: end_time,
            });
        }
        let Some(line) = self.locations.get(&id).map(|location| location.line) else {
            return Ok(false);
        };
        let Some(mut note) = self.remove_note(id) else {
            return Ok(false);
        };
        note.start_time = start_time;
        note.end_time = end_time;
        self.place_note(line, note)?;
        Ok(true)
    }

    /// The note `id`.
    #[must_use]
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        let location = self.locations.get(&id)?;
        self.lines.get(location.line)?.note(
            location.key,
            location.hold,
            id,
            location.start_time,
        )
    }

    /// Number of notes in the chart.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.locations.len()
    }

    fn resolve(&self, note_ref: &NoteNodeRef) -> &[Note] {
        let Some(line) = self.lines.get(note_ref.line) else {
            return &[];
        };
        let list = if note_ref.hold {
            line.hn_list(note_ref.key).map(HNList::list)
        } else {
            line.nn_list(note_ref.key)
        };
        list.and_then(|list| list.node(note_ref.node))
            .map(NoteNode::notes)
            .unwrap_or_default()
    }

    /// Notes starting in `[from, to)` on any line, ordered by start time.
    pub fn notes_between(
        &self,
        from: RationalTime,
        to: RationalTime,
    ) -> impl Iterator<Item = &Note> {
        self.nnn
            .nodes_between(from, to)
            .flat_map(|(_, node)| node.refs())
            .flat_map(|note_ref| self.resolve(note_ref))
    }

    /// Number of judged notes, fakes excluded.
    #[must_use]
    pub fn max_combo(&self) -> usize {
        self.nnn
            .iter()
            .flat_map(|(_, node)| node.refs())
            .flat_map(|note_ref| self.resolve(note_ref))
            .filter(|note| !note.is_fake)
            .count()
    }

    /// Number of judged notes starting before `beats`.
    #[must_use]
    pub fn combo_before(&self, beats: RationalTime) -> usize {
        self.nnn
            .iter()
            .take_while(|(_, node)| node.start_time() < beats)
            .flat_map(|(_, node)| node.refs())
            .flat_map(|note_ref| self.resolve(note_ref))
            .filter(|note| !note.is_fake)
            .count()
    }

    /// Seconds elapsed at `beats`, counting the offset.
    #[must_use]
    pub fn seconds_at(&self, beats: RationalTime) -> f64 {
        self.tempo.to_seconds(beats) + self.meta.offset
    }

    /// Beats reached after `seconds`, counting the offset.
    #[must_use]
    pub fn beats_at(&self, seconds: f64) -> f64 {
        self.tempo.seconds_to_beats(seconds - self.meta.offset)
    }

    /// Wraps the segments from `from` to `to` of a line's `kind` sequence in layer `layer` into a
    /// new template easing called `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`ChartError::UnknownLine`] or [`ChartError::UnknownLayer`] if there is no such
    /// sequence, or if encapsulation itself fails.
    pub fn encapsulate(
        &mut self,
        line: usize,
        layer: usize,
        kind: EventKind,
        from: NodeId,
        to: NodeId,
        name: impl Into<String>,
    ) -> Result<Rc<TemplateEasing>> {
        let sequence = self
            .lines
            .get_mut(line)
            .ok_or(ChartError::UnknownLine(line))?
            .layers
            .get_mut(layer)
            .and_then(|layer| layer.sequence_mut(kind))
            .ok_or(ChartError::UnknownLayer { line, layer, kind })?;
        Ok(sequence.encapsulate(from, to, name, &mut self.templates)?)
    }

    /// Expands the template easing of the segment opened by `start` back into plain segments.
    ///
    /// # Errors
    ///
    /// Fails with [`ChartError::UnknownLine`] or [`ChartError::UnknownLayer`] if there is no such
    /// sequence, or if `start` is not templated.
    pub fn substitute(
        &mut self,
        line: usize,
        layer: usize,
        kind: EventKind,
        start: NodeId,
    ) -> Result<()> {
        let sequence = self
            .line_mut(line)?
            .layer_mut(layer)
            .and_then(|layer| layer.sequence_mut(kind))
            .ok_or(ChartError::UnknownLayer { line, layer, kind })?;
        Ok(sequence.substitute(start)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::error::SequenceError;
    use crate::event::EventPair;
    use crate::node_list::NodeList;
    use crate::time::beats;
    use pretty_assertions::assert_eq;
    use strict_num_extended::PositiveF64;

    fn chart() -> Chart {
        let config = ChartConfig::default();
        let bpm = PositiveF64::new(120.0).unwrap();
        let span = beats(16, 0, 1);
        Chart::new(BpmSequence::constant(bpm, span, config.jump), span, config)
    }

    #[test]
    fn test_layers_add_up() {
        let mut chart = chart();
        let index = chart.add_line("main");
        let line = chart.line_mut(index).unwrap();
        let span = beats(16, 0, 1);
        let mut moving = EventNodeSequence::new(0.0, span, JumpConfig::default());
        moving
            .insert_at(EventPair::new(beats(4, 0, 1), 8.0, 8.0, Easing::LINEAR))
            .unwrap();
        let mut base = EventLayer::default();
        base.move_x = Some(moving);
        let mut offset = EventLayer::default();
        offset.move_x = Some(EventNodeSequence::new(1.5, span, JumpConfig::default()));
        line.push_layer(base);
        line.push_layer(offset);

        let line = chart.line(index).unwrap();
        assert_eq!(line.value_at(EventKind::MoveX, beats(2, 0, 1)), 5.5);
        assert_eq!(line.value_at(EventKind::MoveX, beats(5, 0, 1)), 9.5);
        assert_eq!(line.value_at(EventKind::Rotate, beats(5, 0, 1)), 0.0);
    }

    #[test]
    fn test_floor_position_integrates_speed() {
        let mut chart = chart();
        let index = chart.add_line("main");
        let mut layer = EventLayer::default();
        layer.speed = Some(EventNodeSequence::new(
            2.0,
            beats(16, 0, 1),
            JumpConfig::default(),
        ));
        chart.line_mut(index).unwrap().push_layer(layer);
        let line = chart.line(index).unwrap();
        assert_eq!(line.floor_position_at(beats(3, 0, 1)), 6.0);
    }

    #[test]
    fn test_notes_stay_indexed_chart_wide() {
        let mut chart = chart();
        let a = chart.add_line("a");
        let b = chart.add_line("b");
        let tap = chart.add_note(a, Note::tap(beats(1, 0, 1))).unwrap();
        let hold = chart
            .add_note(b, Note::hold(beats(1, 0, 1), beats(3, 0, 1)))
            .unwrap();
        let mut fake = Note::tap(beats(2, 0, 1));
        fake.is_fake = true;
        let fake = chart.add_note(b, fake).unwrap();
        let late = chart.add_note(a, Note::tap(beats(5, 0, 1))).unwrap();

        assert_eq!(chart.note_count(), 4);
        assert_eq!(chart.max_combo(), 3);
        assert_eq!(chart.combo_before(beats(2, 0, 1)), 2);
        assert_eq!(chart.combo_before(beats(5, 1, 2)), 3);
        let between: Vec<_> = chart
            .notes_between(beats(1, 0, 1), beats(5, 0, 1))
            .map(|note| note.id)
            .collect();
        assert!(between.contains(&tap) && between.contains(&hold));
        assert!(between.contains(&fake) && !between.contains(&late));

        assert_eq!(chart.remove_note(tap).map(|note| note.id), Some(tap));
        assert_eq!(chart.remove_note(tap), None);
        assert_eq!(chart.nnn().len(), 3);
        chart.remove_note(hold);
        assert_eq!(chart.nnn().len(), 2);
        assert_eq!(chart.max_combo(), 1);
        assert_eq!(chart.line(a).unwrap().note_count(), 1);
    }

    #[test]
    fn test_moving_a_note_keeps_its_id() {
        let mut chart = chart();
        let line = chart.add_line("main");
        let id = chart.add_note(line, Note::tap(beats(1, 0, 1))).unwrap();
        assert!(chart.set_note_time(id, beats(6, 0, 1), beats(6, 0, 1)).unwrap());
        assert_eq!(
            chart.note(id).map(|note| note.start_time),
            Some(beats(6, 0, 1))
        );
        assert_eq!(chart.combo_before(beats(6, 0, 1)), 0);
        let next = chart.add_note(line, Note::tap(beats(2, 0, 1))).unwrap();
        assert_ne!(next, id);
        assert!(matches!(
            chart.set_note_time(id, beats(3, 0, 1), beats(2, 0, 1)),
            Err(ChartError::ReversedNote { .. })
        ));
    }

    #[test]
    fn test_unknown_line() {
        let mut chart = chart();
        assert!(matches!(
            chart.add_note(3, Note::tap(RationalTime::ZERO)),
            Err(ChartError::UnknownLine(3))
        ));
    }

    #[test]
    fn test_unknown_layer() {
        let mut chart = chart();
        let line = chart.add_line("main");
        let node = NodeList::new().push_back(());
        assert!(matches!(
            chart.substitute(line, 0, EventKind::Alpha, node),
            Err(ChartError::UnknownLayer {
                layer: 0,
                kind: EventKind::Alpha,
                ..
            })
        ));

        let mut layer = EventLayer::default();
        layer.set_sequence(
            EventKind::MoveX,
            EventNodeSequence::new(0.0, beats(16, 0, 1), JumpConfig::default()),
        );
        chart.line_mut(line).unwrap().push_layer(layer);
        assert!(matches!(
            chart.encapsulate(line, 0, EventKind::Rotate, node, node, "spin"),
            Err(ChartError::UnknownLayer {
                kind: EventKind::Rotate,
                ..
            })
        ));
        assert!(matches!(
            chart.substitute(line, 1, EventKind::MoveX, node),
            Err(ChartError::UnknownLayer { layer: 1, .. })
        ));
        let first = chart.lines()[line].layers()[0]
            .sequence(EventKind::MoveX)
            .unwrap()
            .first_start();
        assert!(matches!(
            chart.substitute(line, 0, EventKind::MoveX, first),
            Err(ChartError::Sequence(SequenceError::NotTemplated(_)))
        ));
    }
}
