//! Short-lived visual effects: ball trails and event overlays

use std::collections::VecDeque;

use serde::Serialize;

use crate::stream::protocol::{EventKind, Side};

use super::geometry::Point;

/// How long a ball trail stays visible
pub const TRAIL_LIFETIME_MS: u64 = 2500;
/// Most trails kept at once; the oldest is dropped first
pub const MAX_TRAILS: usize = 5;

/// Recent ball path
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trail {
    pub start: Point,
    pub end: Point,
    pub team: Side,
    pub created_at_ms: u64,
}

impl Trail {
    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) < TRAIL_LIFETIME_MS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    GoalFlash,
    YellowCard,
    RedCard,
    FoulMarker,
}

impl OverlayKind {
    pub fn lifetime_ms(self) -> u64 {
        match self {
            OverlayKind::GoalFlash => 2000,
            OverlayKind::YellowCard | OverlayKind::RedCard => 3000,
            OverlayKind::FoulMarker => 1500,
        }
    }

    /// Overlay shown for an event, if any. A second yellow is shown as a red.
    pub fn for_event(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Goal => Some(OverlayKind::GoalFlash),
            EventKind::YellowCard => Some(OverlayKind::YellowCard),
            EventKind::SecondYellow | EventKind::RedCard => Some(OverlayKind::RedCard),
            EventKind::Foul => Some(OverlayKind::FoulMarker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overlay {
    pub kind: OverlayKind,
    pub position: Point,
    pub created_at_ms: u64,
}

impl Overlay {
    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) < self.kind.lifetime_ms()
    }
}

/// Trails and overlays for one view
#[derive(Debug, Clone, Default)]
pub struct Effects {
    trails: VecDeque<Trail>,
    overlays: Vec<Overlay>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_trail(&mut self, trail: Trail) {
        self.trails.push_back(trail);
        while self.trails.len() > MAX_TRAILS {
            self.trails.pop_front();
        }
    }

    pub fn push_overlay(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
    }

    /// Trails still within their lifetime, oldest first
    pub fn active_trails(&self, now_ms: u64) -> Vec<Trail> {
        self.trails.iter().filter(|t| t.is_live(now_ms)).copied().collect()
    }

    pub fn active_overlays(&self, now_ms: u64) -> Vec<Overlay> {
        self.overlays.iter().filter(|o| o.is_live(now_ms)).copied().collect()
    }

    /// Drop everything that has expired
    pub fn prune(&mut self, now_ms: u64) {
        self.trails.retain(|t| t.is_live(now_ms));
        self.overlays.retain(|o| o.is_live(now_ms));
    }

    pub fn clear(&mut self) {
        self.trails.clear();
        self.overlays.clear();
    }

    pub fn trail_count(&self) -> usize {
        self.trails.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }
}
