use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::VisemeId;

/// One planned mouth shape, active over `[start_offset_ms, start_offset_ms + duration_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisemeEvent {
    pub viseme: VisemeId,
    pub start_offset_ms: u64,
    pub duration_ms: u32,
    pub intensity: f32,
}

impl VisemeEvent {
    pub fn new(viseme: VisemeId, start_offset_ms: u64, duration_ms: u32, intensity: f32) -> Self {
        Self {
            viseme,
            start_offset_ms,
            duration_ms,
            intensity,
        }
    }

    /// The open-ended rest pose returned whenever nothing is scheduled.
    pub const fn silence() -> Self {
        Self {
            viseme: VisemeId::Sil,
            start_offset_ms: 0,
            duration_ms: 0,
            intensity: 0.0,
        }
    }

    /// Exclusive end of the event.
    pub fn end_offset_ms(&self) -> u64 {
        self.start_offset_ms
            .saturating_add(u64::from(self.duration_ms))
    }

    pub fn contains(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.start_offset_ms && elapsed_ms < self.end_offset_ms()
    }
}

/// Immutable, shareable sequence of viseme events ordered by start offset.
///
/// Cloning is cheap; readers such as a captions overlay can hold a snapshot
/// while the engine swaps in a new timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisemeTimeline {
    events: Arc<[VisemeEvent]>,
}

impl Default for VisemeTimeline {
    fn default() -> Self {
        Self {
            events: Arc::from(Vec::new()),
        }
    }
}

impl VisemeTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a timeline, sorting by start offset. The sort is stable so
    /// events sharing a start keep their relative order.
    pub fn from_events(mut events: Vec<VisemeEvent>) -> Self {
        events.sort_by_key(|event| event.start_offset_ms);
        Self {
            events: events.into(),
        }
    }

    pub fn events(&self) -> &[VisemeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// End of the last-finishing event.
    pub fn duration_ms(&self) -> u64 {
        self.events
            .iter()
            .map(VisemeEvent::end_offset_ms)
            .max()
            .unwrap_or(0)
    }

    /// Returns the event active at `elapsed_ms`, or silence.
    pub fn select(&self, elapsed_ms: u64) -> VisemeEvent {
        select(self, elapsed_ms)
    }
}

/// Picks the first event whose half-open interval contains `elapsed_ms`.
///
/// Elapsed times before the first event, inside a gap, past the end, or
/// against an empty timeline all resolve to [`VisemeEvent::silence`].
/// Timelines are short, so a linear scan is fine.
pub fn select(timeline: &VisemeTimeline, elapsed_ms: u64) -> VisemeEvent {
    timeline
        .events()
        .iter()
        .find(|event| event.contains(elapsed_ms))
        .copied()
        .unwrap_or_else(VisemeEvent::silence)
}

/// Wall-clock anchor for one playback session, in host milliseconds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackClock {
    started_at_ms: Option<u64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures `now_ms` as the start instant. Re-arming resets elapsed to 0.
    pub fn arm(&mut self, now_ms: u64) {
        self.started_at_ms = Some(now_ms);
    }

    pub fn reset(&mut self) {
        self.started_at_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Milliseconds since [`arm`](Self::arm). Saturates at zero if the host
    /// clock steps backwards, and reads zero when unarmed.
    pub fn elapsed(&self, now_ms: u64) -> u64 {
        self.started_at_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0)
    }
}
