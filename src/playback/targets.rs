//! Per-role position targets for one step, and idle off-ball shaping

use std::collections::HashMap;

use crate::stream::protocol::{ActionKind, Side, Step};

use super::geometry::{clamp, distance, lerp, pseudo_random, Point, PITCH_CENTRE, PITCH_MAX, PITCH_MIN};
use super::roster::{Role, Roster};

/// Pull applied to the acting agent per step
pub const ACTOR_PULL: f32 = 0.6;

/// Teammates closer than this to the ball's landing point make support runs
pub const SUPPORT_RADIUS: f32 = 35.0;
/// Pull on a supporting teammate standing on the landing point; fades to 0 at the radius
pub const SUPPORT_PULL: f32 = 0.35;

/// Opponents closer than this to the landing point shadow the play
pub const SHADOW_RADIUS: f32 = 22.0;
/// Pull on a shadowing opponent standing on the landing point; fades to 0 at the radius
pub const SHADOW_PULL: f32 = 0.45;

/// Support targets never land closer than this to the ball
pub const MIN_SUPPORT_GAP: f32 = 5.5;

/// How far defenders close on their line's average x per idle application
pub const LINE_SYNC_BLEND: f32 = 0.7;
/// Largest idle y-jitter, in pitch units
pub const IDLE_JITTER: f32 = 1.2;

const SUPPORT_X: (f32, f32) = (3.0, 97.0);
const SUPPORT_Y: (f32, f32) = (5.0, 95.0);

/// x of the goal line a side defends
pub fn defended_goal_x(side: Side) -> f32 {
    match side {
        Side::Home => 5.0,
        Side::Away => 95.0,
    }
}

/// Where the acting agent heads during a step
pub fn actor_target(step: &Step) -> Point {
    match step.action {
        // Striking actions: the agent stays put and the ball leaves them
        ActionKind::Shoot
        | ActionKind::Header
        | ActionKind::Clearance
        | ActionKind::Tackle
        | ActionKind::Foul => step.ball_start,
        // Keeper dives across the shot line
        ActionKind::Save => step.ball_end,
        ActionKind::Run
        | ActionKind::Pass
        | ActionKind::Cross
        | ActionKind::Dribble
        | ActionKind::Interception => step.ball_end,
    }
}

/// Passing-lane target for a teammate of the play.
///
/// Offsets `4 + id % 5` along the ball's travel (backwards when `possessing`
/// is false) and `8 + id % 7` across it, on the side of the play line the
/// agent already stands on, so several supporters fan out into distinct lanes.
pub fn support_target(
    agent_id: u32,
    agent_pos: Point,
    ball_start: Point,
    ball_end: Point,
    possessing: bool,
) -> Point {
    let (ux, uy) = ball_start.direction_to(ball_end).unwrap_or((1.0, 0.0));
    let (nx, ny) = (-uy, ux);

    let depth = (4 + agent_id % 5) as f32 * if possessing { 1.0 } else { -1.0 };
    let width = (8 + agent_id % 7) as f32;

    let across = (agent_pos.x - ball_end.x) * nx + (agent_pos.y - ball_end.y) * ny;
    let side = if across < 0.0 { -1.0 } else { 1.0 };

    let lane = |side: f32| {
        clamp_support(Point::new(
            ball_end.x + ux * depth + nx * side * width,
            ball_end.y + uy * depth + ny * side * width,
        ))
    };

    let preferred = lane(side);
    if distance(preferred, ball_end) >= MIN_SUPPORT_GAP {
        return preferred;
    }

    // Pinned against the touchline: try the other lane, then drop towards the middle
    let other = lane(-side);
    if distance(other, ball_end) >= MIN_SUPPORT_GAP {
        return other;
    }

    let (cx, cy) = ball_end.direction_to(PITCH_CENTRE).unwrap_or((nx, ny));
    clamp_support(Point::new(ball_end.x + cx * width, ball_end.y + cy * width))
}

fn clamp_support(p: Point) -> Point {
    Point::new(
        clamp(p.x, SUPPORT_X.0, SUPPORT_X.1),
        clamp(p.y, SUPPORT_Y.0, SUPPORT_Y.1),
    )
}

/// Shadow position for an opponent of the play: halfway between the ball and
/// its own goal line, and halfway between the ball's y and its current y.
pub fn defensive_target(agent_pos: Point, side: Side, ball_end: Point) -> Point {
    Point::new(
        (ball_end.x + defended_goal_x(side)) / 2.0,
        (ball_end.y + agent_pos.y) / 2.0,
    )
}

/// Strength that fades linearly from `max` at the ball to 0 at `radius`
fn radius_scaled(max: f32, d: f32, radius: f32) -> f32 {
    max * (1.0 - d / radius).max(0.0)
}

/// Who moved during a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepMotion {
    pub actor: Option<u32>,
    pub supporters: Vec<u32>,
    pub shadows: Vec<u32>,
}

/// Move every agent for one step.
///
/// `actor` is the resolved acting agent (if any), `acting_side` the side
/// making the play. Agents not involved keep their position.
pub fn apply_step(roster: &mut Roster, step: &Step, actor: Option<u32>, acting_side: Side) -> StepMotion {
    let mut motion = StepMotion {
        actor,
        ..Default::default()
    };
    let actor_goal = actor_target(step);

    for agent in roster.iter_mut() {
        if Some(agent.id) == actor {
            agent.pos = lerp(agent.pos, actor_goal, ACTOR_PULL);
            continue;
        }
        if agent.is_goalkeeper() {
            continue;
        }

        let d = distance(agent.pos, step.ball_end);
        if agent.side == acting_side {
            if d < SUPPORT_RADIUS {
                let target = support_target(agent.id, agent.pos, step.ball_start, step.ball_end, true);
                agent.pos = lerp(agent.pos, target, radius_scaled(SUPPORT_PULL, d, SUPPORT_RADIUS));
                motion.supporters.push(agent.id);
            }
        } else if d < SHADOW_RADIUS {
            let target = defensive_target(agent.pos, agent.side, step.ball_end);
            agent.pos = lerp(agent.pos, target, radius_scaled(SHADOW_PULL, d, SHADOW_RADIUS));
            motion.shadows.push(agent.id);
        }
    }

    motion
}

/// Pull each side's defenders towards their line's average x
pub fn sync_defensive_lines(roster: &mut Roster) {
    let mut lines: HashMap<Side, (f32, usize)> = HashMap::new();
    for agent in roster.iter().filter(|a| a.role == Role::Defender) {
        let entry = lines.entry(agent.side).or_insert((0.0, 0));
        entry.0 += agent.pos.x;
        entry.1 += 1;
    }

    for agent in roster.iter_mut().filter(|a| a.role == Role::Defender) {
        if let Some(&(sum, count)) = lines.get(&agent.side) {
            let avg = sum / count as f32;
            agent.pos.x = clamp(
                agent.pos.x + (avg - agent.pos.x) * LINE_SYNC_BLEND,
                PITCH_MIN,
                PITCH_MAX,
            );
        }
    }
}

/// Reproducible y-jitter for an agent at a given minute, within `±IDLE_JITTER`
pub fn idle_jitter(minute: u32, agent_id: u32) -> f32 {
    let seed = i64::from(minute) * 1000 + i64::from(agent_id);
    (pseudo_random(seed) * 2.0 - 1.0) * IDLE_JITTER
}

/// Off-ball shaping for minutes with nothing to animate.
///
/// Jitter is anchored on the formation y, so it never accumulates across minutes.
pub fn apply_idle_sync(roster: &mut Roster, minute: u32) {
    sync_defensive_lines(roster);
    for agent in roster.iter_mut() {
        agent.pos.y = clamp(agent.base.y + idle_jitter(minute, agent.id), PITCH_MIN, PITCH_MAX);
    }
}
