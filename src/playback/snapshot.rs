//! Render frame building
//!
//! A render frame is everything a drawing surface needs for one paint: agent
//! positions with headings, the ball and its flight, live trails and overlays,
//! and the scoreboard.

use serde::Serialize;

use crate::stream::protocol::{MatchPhase, Score, Side};

use super::direction::Heading;
use super::effects::{Overlay, Trail};
use super::roster::Role;
use super::scheduler::{PlaybackPhase, SequenceScheduler};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentFrame {
    pub id: u32,
    pub team: Side,
    pub role: Role,
    pub shirt_number: Option<u32>,
    pub x: f32,
    pub y: f32,
    /// Present only while the agent is moving
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<Heading>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BallFrame {
    /// Where the ball is heading (its resting point at the end of the flight)
    pub x: f32,
    pub y: f32,
    pub from_x: f32,
    pub from_y: f32,
    /// 0 on the ground, 1 at the highest arc
    pub height: f32,
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub generation: u64,
    pub minute: u32,
    pub match_phase: MatchPhase,
    pub playback: PlaybackPhase,
    pub agents: Vec<AgentFrame>,
    pub ball: BallFrame,
    pub active_agent: Option<u32>,
    pub trails: Vec<Trail>,
    pub overlays: Vec<Overlay>,
    pub ball_transition_ms: u32,
    pub agent_transition_ms: u32,
    pub score: Score,
    pub commentary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
    /// View clock at build time
    pub at_ms: u64,
}

impl RenderFrame {
    /// Frame for a view that has not received anything yet
    pub fn empty() -> Self {
        SequenceScheduler::default().frame(0)
    }
}

impl SequenceScheduler {
    /// Render the scheduler's current state at `now_ms`
    pub fn frame(&self, now_ms: u64) -> RenderFrame {
        let headings = self.headings();
        let agents = self
            .roster()
            .iter()
            .map(|a| AgentFrame {
                id: a.id,
                team: a.side,
                role: a.role,
                shirt_number: a.shirt_number,
                x: a.pos.x,
                y: a.pos.y,
                heading: headings.get(&a.id).copied(),
            })
            .collect();

        let flight = self.ball();
        let ball = BallFrame {
            x: flight.to.x,
            y: flight.to.y,
            from_x: flight.from.x,
            from_y: flight.from.y,
            height: flight.height(now_ms),
            progress: flight.progress(now_ms),
        };

        RenderFrame {
            generation: self.generation(),
            minute: self.minute(),
            match_phase: self.match_phase(),
            playback: self.phase(),
            agents,
            ball,
            active_agent: self.active_agent(),
            trails: self.effects().active_trails(now_ms),
            overlays: self.effects().active_overlays(now_ms),
            ball_transition_ms: flight.transition_ms,
            agent_transition_ms: self.agent_transition_ms(),
            score: self.score(),
            commentary: self.commentary().to_string(),
            halted: self.halted().map(str::to_string),
            at_ms: now_ms,
        }
    }
}

/// Decides when a view publishes a frame
pub struct FrameBuilder {
    /// Render ticks since the last publish
    ticks_since_publish: u32,
    /// Publish at least this often, even when nothing moves
    keepalive_ticks: u32,
    /// State changed since the last publish
    dirty: bool,
}

impl FrameBuilder {
    pub fn new(keepalive_ticks: u32) -> Self {
        Self {
            ticks_since_publish: 0,
            keepalive_ticks: keepalive_ticks.max(1),
            dirty: true,
        }
    }

    /// Publish on the next render tick regardless of the keepalive
    pub fn force_next(&mut self) {
        self.dirty = true;
    }

    /// Called once per render tick
    pub fn should_publish(&mut self, phase: PlaybackPhase) -> bool {
        self.ticks_since_publish += 1;
        let animating = matches!(
            phase,
            PlaybackPhase::Draining | PlaybackPhase::ReturnToFormation
        );
        if self.dirty || animating || self.ticks_since_publish >= self.keepalive_ticks {
            self.ticks_since_publish = 0;
            self.dirty = false;
            true
        } else {
            false
        }
    }
}

/// Publish counters for debugging
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct FrameStats {
    pub frames_published: u64,
    pub avg_agents_per_frame: f32,
}

impl FrameStats {
    pub fn record(&mut self, agent_count: usize) {
        self.frames_published += 1;

        let n = self.frames_published as f32;
        self.avg_agents_per_frame =
            self.avg_agents_per_frame * ((n - 1.0) / n) + (agent_count as f32 / n);
    }
}
