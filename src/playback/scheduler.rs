//! Sequence scheduler: turns a tick's events into timed, strictly ordered steps
//!
//! The scheduler is a plain state machine. It never sleeps itself: every
//! transition returns an [`ArmedTimer`] and the owner (see `view`) calls
//! [`SequenceScheduler::on_timer`] when it expires. Each tick bumps the
//! generation, so an expiry that belongs to an older tick is ignored and can
//! never touch the newer animation.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::stream::protocol::{
    ActionKind, Aerial, Lineup, MatchEvent, MatchPhase, PhaseMarker, Score, Side, Step, Tick,
};

use super::direction::{compute_direction_vectors, Heading};
use super::effects::{Effects, Overlay, OverlayKind, Trail};
use super::geometry::{clamp, distance, Point, PITCH_CENTRE};
use super::roster::Roster;
use super::targets::{apply_idle_sync, apply_step};
use super::timing::{ball_height, step_transition_duration};

/// Shortest time a step is shown for
pub const MIN_STEP_MS: u32 = 150;
/// Time allowed to walk back into formation after the last step
pub const RETURN_TO_FORMATION_MS: u32 = 600;
/// Easing hint for idle shaping and resting ball moves
pub const IDLE_EASE_MS: u32 = 800;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// Nothing queued; idle shaping only
    Idle,
    /// Steps remain in the queue
    Draining,
    /// Walking back to formation after the last step
    ReturnToFormation,
    /// An engine error ended this view
    Stopped,
}

/// A timer the owner must arm. Expiry is reported back with its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedTimer {
    pub generation: u64,
    pub delay_ms: u32,
}

/// The ball's current flight
#[derive(Debug, Clone, PartialEq)]
pub struct BallFlight {
    pub from: Point,
    pub to: Point,
    pub action: Option<ActionKind>,
    pub aerial: Aerial,
    pub transition_ms: u32,
    pub started_at_ms: u64,
}

impl BallFlight {
    fn resting(at: Point) -> Self {
        Self {
            from: at,
            to: at,
            action: None,
            aerial: Aerial::None,
            transition_ms: 0,
            started_at_ms: 0,
        }
    }

    /// Share of the flight completed at `now_ms`, in `0..=1`
    pub fn progress(&self, now_ms: u64) -> f32 {
        if self.transition_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(self.started_at_ms) as f32;
        clamp(elapsed / self.transition_ms as f32, 0.0, 1.0)
    }

    pub fn height(&self, now_ms: u64) -> f32 {
        match self.action {
            Some(action) => ball_height(
                action,
                self.aerial,
                distance(self.from, self.to),
                self.progress(now_ms),
            ),
            None => 0.0,
        }
    }
}

/// A queued step with the event context it was flattened from
#[derive(Debug, Clone)]
struct QueuedStep {
    step: Step,
    team: Side,
    /// Shown when this step starts (first step of an event only)
    overlay: Option<(OverlayKind, Point)>,
}

/// One per match view. Owns the agents' animated positions and the ball.
#[derive(Debug)]
pub struct SequenceScheduler {
    generation: u64,
    phase: PlaybackPhase,
    queue: VecDeque<QueuedStep>,
    roster: Roster,
    ball: BallFlight,
    active_agent: Option<u32>,
    headings: HashMap<u32, Heading>,
    agent_transition_ms: u32,
    effects: Effects,
    minute: u32,
    match_phase: MatchPhase,
    score: Score,
    commentary: String,
    halted: Option<String>,
}

impl Default for SequenceScheduler {
    fn default() -> Self {
        Self::new(Roster::default())
    }
}

impl SequenceScheduler {
    pub fn new(roster: Roster) -> Self {
        Self {
            generation: 0,
            phase: PlaybackPhase::Idle,
            queue: VecDeque::new(),
            roster,
            ball: BallFlight::resting(PITCH_CENTRE),
            active_agent: None,
            headings: HashMap::new(),
            agent_transition_ms: 0,
            effects: Effects::new(),
            minute: 0,
            match_phase: MatchPhase::Kickoff,
            score: Score::default(),
            commentary: String::new(),
            halted: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ball(&self) -> &BallFlight {
        &self.ball
    }

    pub fn active_agent(&self) -> Option<u32> {
        self.active_agent
    }

    pub fn headings(&self) -> &HashMap<u32, Heading> {
        &self.headings
    }

    pub fn agent_transition_ms(&self) -> u32 {
        self.agent_transition_ms
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn match_phase(&self) -> MatchPhase {
        self.match_phase
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn commentary(&self) -> &str {
        &self.commentary
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn queued_steps(&self) -> usize {
        self.queue.len()
    }

    /// Back to a fresh idle view: timers invalidated, queue and effects
    /// dropped, agents on their formation slots.
    pub fn reset(&mut self) {
        self.cancel();
        self.phase = PlaybackPhase::Idle;
        self.effects.clear();
        self.headings.clear();
        self.halted = None;
        self.minute = 0;
        self.match_phase = MatchPhase::Kickoff;
        self.score = Score::default();
        self.commentary.clear();
        self.ball = BallFlight::resting(PITCH_CENTRE);
        for agent in self.roster.iter_mut() {
            agent.pos = agent.base;
        }
    }

    /// Replace the agents from a lineup frame. Any running sequence is dropped.
    pub fn load_lineup(&mut self, lineup: &Lineup) {
        self.cancel();
        if self.phase != PlaybackPhase::Stopped {
            self.phase = PlaybackPhase::Idle;
        }
        self.headings.clear();
        self.roster = Roster::from_lineup(lineup);
        info!(agents = self.roster.len(), "Lineup loaded");
    }

    /// Formation update from the tactics side. Only base slots change; the
    /// next return to formation walks to the new slots.
    pub fn set_formation(&mut self, slots: &[(u32, Point)]) -> usize {
        self.roster.set_base_positions(slots)
    }

    /// Rebuild the queue from a new tick, preempting whatever was running
    pub fn on_tick(&mut self, tick: &Tick, now_ms: u64) -> Option<ArmedTimer> {
        if self.phase == PlaybackPhase::Stopped {
            debug!(minute = tick.minute, "Ignoring tick after stream error");
            return None;
        }

        let preempted = self.phase != PlaybackPhase::Idle;
        self.cancel();

        self.minute = tick.minute;
        self.match_phase = tick.match_phase();
        self.score = tick.score;
        self.commentary = tick.commentary.clone();

        let resting_ball = tick.ball.map(Point::clamped);
        self.flatten(&tick.events, resting_ball, now_ms);

        info!(
            minute = tick.minute,
            generation = self.generation,
            events = tick.events.len(),
            steps = self.queue.len(),
            preempted,
            "Tick received"
        );

        if self.queue.is_empty() {
            self.enter_idle(resting_ball, preempted, now_ms);
            return None;
        }

        self.advance(now_ms)
    }

    /// Timer expiry. Stale generations are ignored.
    pub fn on_timer(&mut self, generation: u64, now_ms: u64) -> Option<ArmedTimer> {
        if generation != self.generation {
            trace!(
                stale = generation,
                current = self.generation,
                "Dropping stale timer"
            );
            return None;
        }

        match self.phase {
            PlaybackPhase::Draining if !self.queue.is_empty() => self.advance(now_ms),
            PlaybackPhase::Draining => self.begin_return(),
            PlaybackPhase::ReturnToFormation => {
                self.phase = PlaybackPhase::Idle;
                self.headings.clear();
                debug!(minute = self.minute, "Back in formation");
                None
            }
            PlaybackPhase::Idle | PlaybackPhase::Stopped => None,
        }
    }

    /// Terminal stop after an engine error
    pub fn halt(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(minute = self.minute, error = %message, "Playback halted");
        self.cancel();
        self.phase = PlaybackPhase::Stopped;
        self.halted = Some(message);
    }

    /// Half/full time marker: updates the scoreboard, never preempts
    pub fn on_phase_marker(&mut self, marker: &PhaseMarker, phase: MatchPhase) {
        self.match_phase = phase;
        if let Some(minute) = marker.minute {
            self.minute = minute;
        }
        if let Some(score) = marker.score {
            self.score = score;
        }
        if !marker.commentary.is_empty() {
            self.commentary = marker.commentary.clone();
        }
        info!(?phase, home = self.score.home, away = self.score.away, "Phase marker");
    }

    /// Drop expired trails and overlays
    pub fn prune_effects(&mut self, now_ms: u64) {
        self.effects.prune(now_ms);
    }

    /// Invalidate any armed timer and drop the queue
    fn cancel(&mut self) {
        self.generation += 1;
        self.queue.clear();
        self.active_agent = None;
    }

    fn flatten(&mut self, events: &[MatchEvent], resting_ball: Option<Point>, now_ms: u64) {
        for event in events {
            let kind = event.kind();
            let mut overlay = OverlayKind::for_event(kind);
            let mut first_position = None;

            for (index, raw) in event.sequence.iter().enumerate() {
                match Step::from_value(raw) {
                    Ok(step) => {
                        let position = event.location().unwrap_or(step.ball_end).clamped();
                        first_position.get_or_insert(position);
                        self.queue.push_back(QueuedStep {
                            overlay: overlay.take().map(|k| (k, position)),
                            step,
                            team: event.team,
                        });
                    }
                    Err(e) => {
                        debug!(event = %event.event_type, index, error = %e, "Dropping step");
                    }
                }
            }

            // No visual steps: show the overlay straight away
            if let Some(kind) = overlay {
                let position = event
                    .location()
                    .or(first_position)
                    .or(resting_ball)
                    .unwrap_or(self.ball.to)
                    .clamped();
                self.effects.push_overlay(Overlay {
                    kind,
                    position,
                    created_at_ms: now_ms,
                });
            }
        }
    }

    /// Idle shaping for a tick with nothing to play. When a sequence was cut
    /// short, agents are shaped from their formation slots rather than from
    /// wherever the interrupted step left them.
    fn enter_idle(&mut self, resting_ball: Option<Point>, preempted: bool, now_ms: u64) {
        let before = self.roster.positions();
        if preempted {
            for agent in self.roster.iter_mut() {
                agent.pos = agent.base;
            }
        }
        apply_idle_sync(&mut self.roster, self.minute);
        self.headings = compute_direction_vectors(&before, &self.roster.positions());
        self.agent_transition_ms = IDLE_EASE_MS;
        self.phase = PlaybackPhase::Idle;

        if let Some(at) = resting_ball {
            self.ball = BallFlight {
                from: self.ball.to,
                to: at,
                action: None,
                aerial: Aerial::None,
                transition_ms: IDLE_EASE_MS,
                started_at_ms: now_ms,
            };
        }
    }

    fn advance(&mut self, now_ms: u64) -> Option<ArmedTimer> {
        let Some(queued) = self.queue.pop_front() else {
            return self.begin_return();
        };
        let step = &queued.step;

        let actor = self.resolve_actor(step);
        let acting_side = actor
            .and_then(|id| self.roster.get(id))
            .map(|a| a.side)
            .unwrap_or(queued.team);

        let before = self.roster.positions();
        apply_step(&mut self.roster, step, actor, acting_side);
        self.headings = compute_direction_vectors(&before, &self.roster.positions());

        let duration = step.duration_ms.max(MIN_STEP_MS);
        let from = step.ball_start.clamped();
        let to = step.ball_end.clamped();
        self.ball = BallFlight {
            from,
            to,
            action: Some(step.action),
            aerial: step.aerial,
            transition_ms: step_transition_duration(step, duration),
            started_at_ms: now_ms,
        };

        self.effects.push_trail(Trail {
            start: from,
            end: to,
            team: acting_side,
            created_at_ms: now_ms,
        });
        if let Some((kind, position)) = queued.overlay {
            self.effects.push_overlay(Overlay {
                kind,
                position,
                created_at_ms: now_ms,
            });
        }
        self.effects.prune(now_ms);

        self.active_agent = actor;
        self.agent_transition_ms = duration;
        self.phase = PlaybackPhase::Draining;

        trace!(
            action = ?step.action,
            actor = ?actor,
            duration,
            remaining = self.queue.len(),
            "Step started"
        );

        Some(ArmedTimer {
            generation: self.generation,
            delay_ms: duration,
        })
    }

    fn begin_return(&mut self) -> Option<ArmedTimer> {
        let before = self.roster.positions();
        for agent in self.roster.iter_mut() {
            agent.pos = agent.base;
        }
        self.headings = compute_direction_vectors(&before, &self.roster.positions());
        self.active_agent = None;
        self.agent_transition_ms = RETURN_TO_FORMATION_MS;
        self.phase = PlaybackPhase::ReturnToFormation;

        Some(ArmedTimer {
            generation: self.generation,
            delay_ms: RETURN_TO_FORMATION_MS,
        })
    }

    /// Id first, then display name. Unknown actors resolve to `None`.
    fn resolve_actor(&self, step: &Step) -> Option<u32> {
        if let Some(id) = step.actor_id {
            if self.roster.get(id).is_some() {
                return Some(id);
            }
            debug!(actor_id = id, "Step actor not on the pitch");
        }
        step.actor_name
            .as_deref()
            .and_then(|name| self.roster.find_by_name(name))
            .map(|a| a.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::geometry::lerp;
    use crate::playback::roster::{Agent, Role};
    use crate::playback::targets::{actor_target, ACTOR_PULL};
    use serde_json::json;

    fn roster() -> Roster {
        let mut passer = Agent::new(7, Side::Home, Role::Midfielder, Point::new(30.0, 40.0));
        passer.name = "Ada Passer".to_string();
        Roster::new(vec![
            Agent::new(1, Side::Home, Role::Goalkeeper, Point::new(5.0, 50.0)),
            Agent::new(3, Side::Home, Role::Defender, Point::new(20.0, 30.0)),
            Agent::new(4, Side::Home, Role::Defender, Point::new(24.0, 70.0)),
            passer,
            Agent::new(9, Side::Home, Role::Forward, Point::new(55.0, 60.0)),
            Agent::new(12, Side::Away, Role::Goalkeeper, Point::new(95.0, 50.0)),
            Agent::new(14, Side::Away, Role::Defender, Point::new(66.0, 48.0)),
            Agent::new(19, Side::Away, Role::Forward, Point::new(40.0, 20.0)),
        ])
    }

    fn pass_step(actor: serde_json::Value, start: (f32, f32), end: (f32, f32), ms: i64) -> serde_json::Value {
        json!({
            "action": "pass",
            "actor_id": actor,
            "ball_start": {"x": start.0, "y": start.1},
            "ball_end": {"x": end.0, "y": end.1},
            "duration_ms": ms
        })
    }

    fn tick(minute: u32, events: Vec<serde_json::Value>) -> Tick {
        serde_json::from_value(json!({
            "minute": minute,
            "phase": "open_play",
            "ball": {"x": 50.0, "y": 50.0},
            "score": {"home": 0, "away": 0},
            "commentary": "",
            "events": events
        }))
        .expect("tick")
    }

    fn event(kind: &str, team: &str, steps: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "event_type": kind,
            "team": team,
            "description": "",
            "sequence": steps
        })
    }

    #[test]
    fn single_pass_runs_the_full_cycle() {
        let mut s = SequenceScheduler::new(roster());
        assert_eq!(s.phase(), PlaybackPhase::Idle);

        let t = tick(10, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]);
        let timer = s.on_tick(&t, 0).expect("step armed");
        assert_eq!(timer.delay_ms, 400);
        assert_eq!(s.phase(), PlaybackPhase::Draining);
        assert_eq!(s.active_agent(), Some(7));

        let step = Step::from_value(&t.events[0].sequence[0]).expect("step");
        let expected = lerp(Point::new(30.0, 40.0), actor_target(&step), ACTOR_PULL);
        let actor = s.roster().get(7).expect("actor").pos;
        assert!((actor.x - expected.x).abs() < 1e-4);
        assert!((actor.y - expected.y).abs() < 1e-4);
        assert_eq!(s.ball().to, Point::new(60.0, 50.0));
        assert!(s.headings().contains_key(&7));

        let timer = s.on_timer(timer.generation, 400).expect("return armed");
        assert_eq!(timer.delay_ms, RETURN_TO_FORMATION_MS);
        assert_eq!(s.phase(), PlaybackPhase::ReturnToFormation);
        assert_eq!(s.active_agent(), None);

        assert!(s.on_timer(timer.generation, 1000).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        for agent in s.roster().iter() {
            assert_eq!(agent.pos, agent.base, "agent {} not home", agent.id);
        }
    }

    #[test]
    fn steps_run_in_flattened_order() {
        let mut s = SequenceScheduler::new(roster());
        let t = tick(
            20,
            vec![
                event("pass", "home", vec![
                    pass_step(json!(3), (20.0, 30.0), (30.0, 40.0), 200),
                    pass_step(json!(7), (30.0, 40.0), (55.0, 60.0), 300),
                ]),
                event("shoot", "home", vec![json!({
                    "action": "shoot",
                    "actor_id": 9,
                    "ball_start": {"x": 55.0, "y": 60.0},
                    "ball_end": {"x": 99.0, "y": 50.0},
                    "duration_ms": 100
                })]),
            ],
        );

        let mut timer = s.on_tick(&t, 0);
        let mut actors = Vec::new();
        let mut delays = Vec::new();
        while let Some(armed) = timer {
            if s.phase() == PlaybackPhase::Draining {
                actors.push(s.active_agent());
                delays.push(armed.delay_ms);
            }
            timer = s.on_timer(armed.generation, 0);
        }

        assert_eq!(actors, vec![Some(3), Some(7), Some(9)]);
        assert_eq!(delays, vec![200, 300, MIN_STEP_MS]);
        assert_eq!(s.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn new_tick_preempts_and_old_timer_is_inert() {
        let mut s = SequenceScheduler::new(roster());
        let first = tick(30, vec![event("pass", "home", vec![
            pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400),
            pass_step(json!(9), (60.0, 50.0), (70.0, 30.0), 400),
        ])]);
        let stale = s.on_tick(&first, 0).expect("armed");

        let second = tick(31, vec![event("pass", "home", vec![pass_step(json!(3), (20.0, 30.0), (40.0, 35.0), 500)])]);
        let live = s.on_tick(&second, 100).expect("armed");
        assert!(live.generation > stale.generation);
        assert_eq!(s.queued_steps(), 0);
        assert_eq!(s.active_agent(), Some(3));

        let positions = s.roster().positions();
        let ball = s.ball().clone();
        assert!(s.on_timer(stale.generation, 400).is_none());
        assert_eq!(s.roster().positions(), positions);
        assert_eq!(s.ball(), &ball);
        assert_eq!(s.active_agent(), Some(3));
        assert_eq!(s.phase(), PlaybackPhase::Draining);
    }

    #[test]
    fn tick_during_return_to_formation_preempts() {
        let mut s = SequenceScheduler::new(roster());
        let t = tick(40, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]);
        let armed = s.on_tick(&t, 0).expect("armed");
        let returning = s.on_timer(armed.generation, 400).expect("return");
        assert_eq!(s.phase(), PlaybackPhase::ReturnToFormation);

        assert!(s.on_tick(&tick(41, vec![]), 500).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        assert!(s.on_timer(returning.generation, 1000).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn empty_tick_mid_step_shapes_from_formation() {
        let mut s = SequenceScheduler::new(roster());
        let t = tick(42, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]);
        s.on_tick(&t, 0).expect("armed");
        let mid_step = s.roster().get(7).expect("actor").pos;
        assert_ne!(mid_step, Point::new(30.0, 40.0));

        assert!(s.on_tick(&tick(43, vec![]), 200).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        for agent in s.roster().iter().filter(|a| a.role != Role::Defender) {
            assert_eq!(agent.pos.x, agent.base.x, "agent {} kept a mid-step x", agent.id);
            assert!((agent.pos.y - agent.base.y).abs() <= 1.2);
        }
        assert!(s.headings().contains_key(&7));
    }

    #[test]
    fn empty_tick_stays_idle_with_bounded_jitter() {
        let mut s = SequenceScheduler::new(roster());
        assert!(s.on_tick(&tick(5, vec![event("corner", "away", vec![])]), 0).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Idle);
        for agent in s.roster().iter() {
            assert!((agent.pos.y - agent.base.y).abs() <= 1.2);
        }
        assert_eq!(s.ball().to, Point::new(50.0, 50.0));
    }

    #[test]
    fn invalid_steps_are_skipped() {
        let mut s = SequenceScheduler::new(roster());
        let t = tick(50, vec![event("pass", "home", vec![
            json!({"action": "pass", "actor_id": 7, "ball_end": {"x": 1.0, "y": 1.0}, "duration_ms": 300}),
            pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), -5),
            pass_step(json!(9), (60.0, 50.0), (70.0, 30.0), 250),
        ])]);

        let armed = s.on_tick(&t, 0).expect("one valid step");
        assert_eq!(armed.delay_ms, 250);
        assert_eq!(s.active_agent(), Some(9));
        assert_eq!(s.queued_steps(), 0);
    }

    #[test]
    fn missing_actor_does_not_stop_playback() {
        let mut s = SequenceScheduler::new(roster());
        let t = tick(60, vec![event("pass", "home", vec![pass_step(json!(777), (30.0, 40.0), (60.0, 50.0), 300)])]);
        // Out of support range of the landing point
        let before = s.roster().get(3).expect("agent").pos;

        let armed = s.on_tick(&t, 0).expect("armed");
        assert_eq!(s.active_agent(), None);
        assert_eq!(s.roster().get(3).map(|a| a.pos), Some(before));
        assert!(s.on_timer(armed.generation, 300).is_some());
    }

    #[test]
    fn actor_resolved_by_name() {
        let mut s = SequenceScheduler::new(roster());
        let step = json!({
            "action": "dribble",
            "actor": "ada passer",
            "ball_start": {"x": 30.0, "y": 40.0},
            "ball_end": {"x": 40.0, "y": 40.0},
            "duration_ms": 500
        });
        let armed = s.on_tick(&tick(61, vec![event("pass", "home", vec![step])]), 0).expect("armed");
        assert_eq!(s.active_agent(), Some(7));
        assert_eq!(s.ball().transition_ms, armed.delay_ms);
    }

    #[test]
    fn goal_event_flashes_and_trails() {
        let mut s = SequenceScheduler::new(roster());
        let shot = json!({
            "action": "shoot",
            "actor_id": 9,
            "ball_start": {"x": 80.0, "y": 50.0},
            "ball_end": {"x": 99.0, "y": 50.0},
            "duration_ms": 300
        });
        let mut goal = event("goal", "home", vec![shot]);
        goal["x"] = json!(95.0);
        goal["y"] = json!(50.0);
        s.on_tick(&tick(70, vec![goal, event("yellow_card", "away", vec![])]), 1000);

        let overlays = s.effects().active_overlays(1000);
        let kinds: Vec<_> = overlays.iter().map(|o| o.kind).collect();
        assert!(kinds.contains(&OverlayKind::GoalFlash));
        assert!(kinds.contains(&OverlayKind::YellowCard));
        let flash = overlays.iter().find(|o| o.kind == OverlayKind::GoalFlash).expect("flash");
        assert_eq!(flash.position, Point::new(95.0, 50.0));
        assert_eq!(s.effects().active_trails(1000).len(), 1);
    }

    #[test]
    fn aerial_ball_rises_mid_flight() {
        let mut s = SequenceScheduler::new(roster());
        let cross = json!({
            "action": "cross",
            "actor_id": 9,
            "ball_start": {"x": 80.0, "y": 10.0},
            "ball_end": {"x": 88.0, "y": 50.0},
            "duration_ms": 600
        });
        s.on_tick(&tick(75, vec![event("pass", "home", vec![cross])]), 0);
        let ball = s.ball();
        let half = ball.started_at_ms + u64::from(ball.transition_ms / 2);
        assert!(ball.height(half) > 0.0);
        assert_eq!(ball.height(ball.started_at_ms), 0.0);
    }

    #[test]
    fn error_halts_for_good() {
        let mut s = SequenceScheduler::new(roster());
        let armed = s
            .on_tick(&tick(80, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]), 0)
            .expect("armed");
        s.halt("engine crashed");

        assert_eq!(s.phase(), PlaybackPhase::Stopped);
        assert_eq!(s.halted(), Some("engine crashed"));
        assert!(s.on_timer(armed.generation, 400).is_none());
        assert!(s.on_tick(&tick(81, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]), 500).is_none());
        assert_eq!(s.phase(), PlaybackPhase::Stopped);
    }

    #[test]
    fn reset_returns_to_a_clean_idle() {
        let mut s = SequenceScheduler::new(roster());
        let armed = s
            .on_tick(&tick(85, vec![event("goal", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]), 0)
            .expect("armed");
        s.reset();

        assert_eq!(s.phase(), PlaybackPhase::Idle);
        assert_eq!(s.effects().trail_count(), 0);
        assert!(s.on_timer(armed.generation, 400).is_none());
        for agent in s.roster().iter() {
            assert_eq!(agent.pos, agent.base);
        }
    }

    #[test]
    fn formation_update_is_used_on_return() {
        let mut s = SequenceScheduler::new(roster());
        let armed = s
            .on_tick(&tick(86, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]), 0)
            .expect("armed");
        assert_eq!(s.set_formation(&[(7, Point::new(35.0, 45.0))]), 1);

        s.on_timer(armed.generation, 400);
        assert_eq!(s.roster().get(7).map(|a| a.pos), Some(Point::new(35.0, 45.0)));
    }

    #[test]
    fn phase_marker_updates_score_without_preempting() {
        let mut s = SequenceScheduler::new(roster());
        let armed = s
            .on_tick(&tick(45, vec![event("pass", "home", vec![pass_step(json!(7), (30.0, 40.0), (60.0, 50.0), 400)])]), 0)
            .expect("armed");
        let marker = PhaseMarker {
            score: Some(Score { home: 1, away: 0 }),
            ..Default::default()
        };
        s.on_phase_marker(&marker, MatchPhase::HalfTime);

        assert_eq!(s.score(), Score { home: 1, away: 0 });
        assert_eq!(s.match_phase(), MatchPhase::HalfTime);
        assert!(s.on_timer(armed.generation, 400).is_some());
    }
}
