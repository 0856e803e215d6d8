//! Template easings: event sequences reused as easing shapes.
//!
//! A template is a numeric sequence spanning its own effective beats. Used as an easing it is
//! stretched over the segment and its value is normalized so that the head value maps to 0 and
//! the final value maps to 1.
//!
//! [`EventNodeSequence::encapsulate`] turns a run of segments into a template and replaces them
//! with a single segment driven by it; [`EventNodeSequence::substitute`] expands such a segment
//! back into plain segments.

use std::collections::BTreeMap;
use std::rc::Rc;

use num::rational::Ratio;

use crate::easing::Easing;
use crate::error::{EasingError, SequenceError};
use crate::event::{EventEndNode, EventNode, EventNodeSequence, EventPair, EventStartNode};
use crate::node_list::{NodeId, NodeList};
use crate::time::RationalTime;

/// Resolution of float progress handed to templates, as `log2` of the grid.
const SCALAR_PROGRESS_BITS: u32 = 20;

/// A named sequence usable as an easing.
#[derive(Debug, Clone)]
pub struct TemplateEasing {
    name: String,
    sequence: EventNodeSequence<f64>,
    head_value: f64,
    value_delta: f64,
}

/// Templates are identified by name.
impl PartialEq for TemplateEasing {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl TemplateEasing {
    /// Wraps `sequence` as a template called `name`.
    pub fn new(name: impl Into<String>, sequence: EventNodeSequence<f64>) -> Self {
        let head_value = sequence.get_value_at(num::zero(), false);
        let tail_value = sequence
            .start_node(sequence.last_start())
            .map_or(head_value, |node| *node.value());
        Self {
            name: name.into(),
            sequence,
            head_value,
            value_delta: tail_value - head_value,
        }
    }

    /// The template's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying sequence.
    #[must_use]
    pub const fn sequence(&self) -> &EventNodeSequence<f64> {
        &self.sequence
    }

    fn normalize(&self, value: f64) -> f64 {
        let offset = value - self.head_value;
        if self.value_delta == 0.0 {
            offset
        } else {
            offset / self.value_delta
        }
    }

    /// Evaluates the template at an exact progress.
    #[must_use]
    pub fn ease(&self, progress: Ratio<i64>) -> f64 {
        let span = self.sequence.effective_beats();
        let time = span.checked_scale(progress).ok().or_else(|| {
            let progress = num::ToPrimitive::to_f64(&progress)?;
            RationalTime::from_scalar_beats(span.to_scalar_beats() * progress)
        });
        let value = match time {
            Some(time) => self.sequence.get_value_at(time, false),
            None => self.sequence.get_value_at(span, true),
        };
        self.normalize(value)
    }

    /// Evaluates the template at a float progress, snapped to a fine dyadic grid.
    #[must_use]
    pub fn ease_scalar(&self, x: f64) -> f64 {
        let grid = f64::from(1_u32 << SCALAR_PROGRESS_BITS);
        let numer = (x.clamp(-1.0, 2.0) * grid).round() as i64;
        self.ease(Ratio::new(numer, 1 << SCALAR_PROGRESS_BITS))
    }
}

/// The templates of a chart, by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateEasingLib {
    templates: BTreeMap<String, Rc<TemplateEasing>>,
}

impl TemplateEasingLib {
    /// An empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Whether a template named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// The template named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<TemplateEasing>> {
        self.templates.get(name).cloned()
    }

    /// Registers a template.
    ///
    /// # Errors
    ///
    /// Fails with [`EasingError::DuplicateTemplate`] if the name is taken.
    pub fn insert(&mut self, template: TemplateEasing) -> Result<Rc<TemplateEasing>, EasingError> {
        if self.contains(template.name()) {
            return Err(EasingError::DuplicateTemplate(template.name));
        }
        let template = Rc::new(template);
        self.templates
            .insert(template.name.clone(), Rc::clone(&template));
        Ok(template)
    }

    /// Registers `sequence` as a template called `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`EasingError::DuplicateTemplate`] if the name is taken.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        sequence: EventNodeSequence<f64>,
    ) -> Result<Rc<TemplateEasing>, EasingError> {
        self.insert(TemplateEasing::new(name, sequence))
    }

    /// Unregisters a template. Segments already using it keep their handle.
    pub fn remove(&mut self, name: &str) -> Option<Rc<TemplateEasing>> {
        self.templates.remove(name)
    }

    /// Iterates templates by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<TemplateEasing>)> {
        self.templates
            .iter()
            .map(|(name, template)| (name.as_str(), template))
    }
}

impl EventNodeSequence<f64> {
    /// Replaces the segments from the start node `from` to the end node `to` by one segment
    /// driven by a new template called `name`.
    ///
    /// The template holds the selection shifted to beat 0 and normalized to run from 0 to 1, so
    /// values inside the selection are unchanged. Returns the registered template.
    ///
    /// # Errors
    ///
    /// Fails if the nodes do not delimit a run of segments, the run starts and ends at the same
    /// value, or the name is taken.
    pub fn encapsulate(
        &mut self,
        from: NodeId,
        to: NodeId,
        name: impl Into<String>,
        library: &mut TemplateEasingLib,
    ) -> Result<Rc<TemplateEasing>, SequenceError> {
        let (origin, head_value) = {
            let start = self.start_node(from)?;
            (start.time(), *start.value())
        };
        let (finish, tail_value) = {
            let end = self.end_node(to)?;
            (end.time(), *end.value())
        };
        let delta = tail_value - head_value;
        if delta == 0.0 {
            return Err(SequenceError::FlatSelection(head_value));
        }

        let mut nodes = NodeList::new();
        let mut interior = Vec::new();
        let mut cursor = from;
        loop {
            let node = self
                .nodes()
                .get(cursor)
                .ok_or(SequenceError::NotContiguous { from, to })?;
            let time = node.time().checked_sub(origin)?;
            let value = (node.value() - head_value) / delta;
            nodes.push_back(match node {
                EventNode::Start(start) => {
                    EventNode::Start(EventStartNode::new(time, value, start.easing().clone()))
                }
                EventNode::End(_) => EventNode::End(EventEndNode::new(time, value)),
            });
            if cursor == to {
                break;
            }
            if cursor != from {
                interior.push(cursor);
            }
            cursor = self
                .nodes()
                .next(cursor)
                .filter(|next| !self.nodes().is_tail(*next))
                .ok_or(SequenceError::NotContiguous { from, to })?;
        }
        let length = finish.checked_sub(origin)?;
        nodes.push_back(EventNode::Start(EventStartNode::new(
            length,
            1.0,
            Easing::LINEAR,
        )));

        let config = *self.jump().config();
        let template = library.add(
            name,
            EventNodeSequence::from_nodes(nodes, length, config),
        )?;
        for id in interior {
            self.nodes_mut().remove(id);
        }
        self.start_node_mut(from)?.easing = Easing::Template(Rc::clone(&template));
        let first_exclusive = self
            .previous_start(from)
            .unwrap_or_else(|| self.nodes().head());
        self.update_range(crate::event::ReindexRange {
            first_exclusive,
            last_inclusive: from,
        });
        self.refresh_integrals_from(from);
        Ok(template)
    }

    /// Expands the template driving the segment opened by `start` back into plain segments.
    ///
    /// # Errors
    ///
    /// Fails with [`SequenceError::NotTemplated`] if the segment has no template easing or no
    /// end.
    pub fn substitute(&mut self, start: NodeId) -> Result<(), SequenceError> {
        let node = self.start_node(start)?;
        let Easing::Template(template) = node.easing() else {
            return Err(SequenceError::NotTemplated(start));
        };
        let template = Rc::clone(template);
        let (origin, from_value) = (node.time(), *node.value());
        let end = self.end_of(start).ok_or(SequenceError::NotTemplated(start))?;
        let (finish, to_value) = {
            let end = self.end_node(end)?;
            (end.time(), *end.value())
        };
        let inner = template.sequence();
        let ratio = finish
            .checked_sub(origin)?
            .ratio_to(inner.effective_beats())
            .ok_or(SequenceError::NotTemplated(start))?;
        let map_value = |value: f64| from_value + template.normalize(value) * (to_value - from_value);

        let last = inner.last_start();
        let mut first_easing = None;
        let mut pairs = Vec::new();
        for (id, inner_start) in inner.start_nodes() {
            if first_easing.is_none() {
                first_easing = Some(inner_start.easing().clone());
                continue;
            }
            if id == last {
                break;
            }
            let Some(inner_end) = inner
                .nodes()
                .previous(id)
                .and_then(|end| inner.end_node(end).ok())
            else {
                continue;
            };
            let time = origin.checked_add(inner_start.time().checked_scale(ratio)?)?;
            pairs.push(EventPair {
                end: EventEndNode::new(time, map_value(*inner_end.value())),
                start: EventStartNode::new(
                    time,
                    map_value(*inner_start.value()),
                    inner_start.easing().clone(),
                ),
            });
        }

        self.start_node_mut(start)?.easing = first_easing.unwrap_or(Easing::LINEAR);
        let mut cursor = start;
        for pair in pairs {
            let end = self
                .nodes_mut()
                .insert_after(cursor, EventNode::End(pair.end))
                .ok_or(SequenceError::DetachedNode(cursor))?;
            cursor = self
                .nodes_mut()
                .insert_after(end, EventNode::Start(pair.start))
                .ok_or(SequenceError::DetachedNode(end))?;
        }
        self.update_range(crate::event::ReindexRange {
            first_exclusive: start,
            last_inclusive: cursor,
        });
        self.update_jump();
        self.refresh_integrals_from(start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JumpConfig;
    use crate::easing::NormalEasing;
    use crate::time::beats;

    /// 0 → 4 quad-out over [0, 2), 4 → 6 over [2, 3), 6 → 10 over [3, 6), then 10.
    fn sequence() -> EventNodeSequence<f64> {
        let mut sequence = EventNodeSequence::new(0.0, beats(8, 0, 1), JumpConfig::default());
        let first = sequence.first_start();
        sequence
            .set_easing(first, Easing::Normal(NormalEasing::QuadOut))
            .unwrap();
        let second = sequence
            .insert(EventPair::new(beats(2, 0, 1), 4.0, 4.0, Easing::LINEAR), first)
            .unwrap();
        let third = sequence
            .insert(EventPair::new(beats(3, 0, 1), 6.0, 6.0, Easing::LINEAR), second)
            .unwrap();
        sequence
            .insert(EventPair::new(beats(6, 0, 1), 10.0, 10.0, Easing::LINEAR), third)
            .unwrap();
        sequence
    }

    #[test]
    fn test_template_normalizes() {
        let mut library = TemplateEasingLib::new();
        let template = library.add("ramp", sequence()).unwrap();
        assert_eq!(template.ease(Ratio::new(0, 1)), 0.0);
        assert!((template.ease(Ratio::new(3, 4)) - 1.0).abs() < 1e-12);
        // Beat 3 of 8 is value 6 of 10.
        assert!((template.ease(Ratio::new(3, 8)) - 0.6).abs() < 1e-12);
        assert!((template.ease_scalar(0.375) - 0.6).abs() < 1e-12);
        assert_eq!(
            library.add("ramp", sequence()).err(),
            Some(EasingError::DuplicateTemplate("ramp".into()))
        );
    }

    #[test]
    fn test_encapsulate_rejects_bad_selections() {
        let mut sequence = sequence();
        let mut library = TemplateEasingLib::new();
        let first = sequence.first_start();
        let last = sequence.last_start();
        assert_eq!(
            sequence.encapsulate(first, last, "x", &mut library).err(),
            Some(SequenceError::NotAnEndNode(last))
        );
        let third = sequence.get_node_at(beats(3, 0, 1), false);
        let first_end = sequence.end_of(first).unwrap();
        assert_eq!(
            sequence.encapsulate(third, first_end, "x", &mut library).err(),
            Some(SequenceError::NotContiguous {
                from: third,
                to: first_end
            })
        );
        let second = sequence.get_node_at(beats(2, 0, 1), false);
        let second_end = sequence.end_of(second).unwrap();
        sequence.set_end_value(second_end, 4.0).unwrap();
        assert_eq!(
            sequence.encapsulate(second, second_end, "x", &mut library).err(),
            Some(SequenceError::FlatSelection(4.0))
        );
        assert!(library.is_empty());
        assert_eq!(sequence.segment_count(), 3);
    }

    #[test]
    fn test_substitute_requires_template() {
        let mut sequence = sequence();
        let first = sequence.first_start();
        assert_eq!(
            sequence.substitute(first),
            Err(SequenceError::NotTemplated(first))
        );
    }
}
