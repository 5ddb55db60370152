//! Match engine stream protocol
//! These are the wire types for the engine → playback text stream, plus the
//! boundary validation that turns loose payloads into closed enums.

use serde::{Deserialize, Serialize};

use crate::playback::geometry::Point;

/// Which side of the pitch a team or agent belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Defends the left goal
    Home,
    /// Defends the right goal
    Away,
}

/// Visual sub-action carried by a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Pass,
    Shoot,
    Header,
    Cross,
    Clearance,
    Dribble,
    Run,
    Tackle,
    Foul,
    Save,
    Interception,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        let kind = match raw.trim().to_ascii_lowercase().as_str() {
            "pass" | "through_ball" => Self::Pass,
            "shoot" | "shot" => Self::Shoot,
            "header" => Self::Header,
            "cross" => Self::Cross,
            "clearance" | "clear" => Self::Clearance,
            "dribble" | "carry" => Self::Dribble,
            "run" => Self::Run,
            "tackle" => Self::Tackle,
            "foul" => Self::Foul,
            "save" => Self::Save,
            "interception" | "intercept" => Self::Interception,
            _ => return None,
        };
        Some(kind)
    }
}

/// Optional trajectory hint attached to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aerial {
    #[default]
    None,
    High,
    Lofted,
}

impl Aerial {
    /// Unknown hints are treated as ground balls
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "lofted" | "lob" => Self::Lofted,
            _ => Self::None,
        }
    }

    pub fn is_raised(self) -> bool {
        matches!(self, Aerial::High | Aerial::Lofted)
    }
}

/// Kind of notable occurrence within a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pass,
    Shoot,
    Header,
    Tackle,
    Foul,
    Save,
    Goal,
    YellowCard,
    SecondYellow,
    RedCard,
    Corner,
    Penalty,
    FreeKick,
    Substitution,
    ShotBlocked,
    ShotOffTarget,
    Offside,
    Other,
}

impl EventKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" => Self::Pass,
            "shoot" | "shot" => Self::Shoot,
            "header" => Self::Header,
            "tackle" => Self::Tackle,
            "foul" => Self::Foul,
            "save" => Self::Save,
            "goal" => Self::Goal,
            "yellow_card" => Self::YellowCard,
            "second_yellow" => Self::SecondYellow,
            "red_card" => Self::RedCard,
            "corner" => Self::Corner,
            "penalty" => Self::Penalty,
            "free_kick" => Self::FreeKick,
            "substitution" => Self::Substitution,
            "shot_blocked" => Self::ShotBlocked,
            "shot_off_target" => Self::ShotOffTarget,
            "offside" => Self::Offside,
            _ => Self::Other,
        }
    }
}

/// Match phase as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Kickoff,
    OpenPlay,
    AttackHome,
    AttackAway,
    SetPiece,
    HalfTime,
    FullTime,
    Other,
}

impl MatchPhase {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kickoff" | "kick_off" => Self::Kickoff,
            "open_play" | "" => Self::OpenPlay,
            "attack_home" => Self::AttackHome,
            "attack_away" => Self::AttackAway,
            "set_piece" => Self::SetPiece,
            "half_time" => Self::HalfTime,
            "full_time" => Self::FullTime,
            _ => Self::Other,
        }
    }
}

/// Goals per side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

/// Per-side counters, shown by the rendering surface as-is
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamStats {
    pub possession_pct: f32,
    pub shots: u32,
    pub shots_on_target: u32,
    pub corners: u32,
    pub fouls: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub saves: u32,
    pub passes: u32,
    pub tackles: u32,
    pub offsides: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchStats {
    pub home: TeamStats,
    pub away: TeamStats,
}

/// One simulated minute (the `minute` frame)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub minute: u32,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub possession: Option<Side>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub ball: Option<Point>,
    #[serde(default)]
    pub events: Vec<MatchEvent>,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub stats: MatchStats,
    #[serde(default)]
    pub commentary: String,
}

impl Tick {
    pub fn match_phase(&self) -> MatchPhase {
        MatchPhase::parse(&self.phase)
    }
}

/// A notable occurrence within a tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchEvent {
    pub event_type: String,
    pub team: Side,
    #[serde(default)]
    pub primary_player: Option<String>,
    #[serde(default)]
    pub primary_player_id: Option<u32>,
    #[serde(default)]
    pub secondary_player: Option<String>,
    #[serde(default)]
    pub secondary_player_id: Option<u32>,
    #[serde(default)]
    pub description: String,
    /// Where the event happened, when the engine reports it
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    /// Steps stay loose until validated, so one bad step cannot sink the tick
    #[serde(default)]
    pub sequence: Vec<serde_json::Value>,
}

impl MatchEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event_type)
    }

    pub fn location(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        }
    }
}

/// Step exactly as it arrives on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStep {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub actor_id: Option<u32>,
    /// Actor display name; used when no id is sent
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub ball_start: Option<Point>,
    #[serde(default)]
    pub ball_end: Option<Point>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub aerial: Option<String>,
}

/// A validated visual sub-action. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: ActionKind,
    pub actor_id: Option<u32>,
    pub actor_name: Option<String>,
    pub ball_start: Point,
    pub ball_end: Point,
    pub duration_ms: u32,
    pub aerial: Aerial,
}

impl Step {
    /// Validate a loose JSON step
    pub fn from_value(value: &serde_json::Value) -> Result<Self, StepRejected> {
        let raw: RawStep = serde_json::from_value(value.clone())
            .map_err(|e| StepRejected::Malformed(e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn travel(&self) -> f32 {
        crate::playback::geometry::distance(self.ball_start, self.ball_end)
    }
}

impl TryFrom<RawStep> for Step {
    type Error = StepRejected;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let action_raw = raw.action.ok_or(StepRejected::MissingAction)?;
        let action = ActionKind::parse(&action_raw).ok_or(StepRejected::UnknownAction(action_raw))?;
        let ball_start = raw.ball_start.ok_or(StepRejected::MissingBallStart)?;
        let ball_end = raw.ball_end.ok_or(StepRejected::MissingBallEnd)?;
        let duration = raw.duration_ms.ok_or(StepRejected::MissingDuration)?;
        if duration <= 0 {
            return Err(StepRejected::NonPositiveDuration(duration));
        }

        Ok(Self {
            action,
            actor_id: raw.actor_id,
            actor_name: raw.actor,
            ball_start,
            ball_end,
            duration_ms: u32::try_from(duration).unwrap_or(u32::MAX),
            aerial: raw.aerial.as_deref().map(Aerial::parse).unwrap_or_default(),
        })
    }
}

/// Why a step was excluded from the queue
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepRejected {
    #[error("step has no action")]
    MissingAction,

    #[error("unknown step action: {0}")]
    UnknownAction(String),

    #[error("step has no ball_start")]
    MissingBallStart,

    #[error("step has no ball_end")]
    MissingBallEnd,

    #[error("step has no duration_ms")]
    MissingDuration,

    #[error("step duration must be positive, got {0}")]
    NonPositiveDuration(i64),

    #[error("malformed step: {0}")]
    Malformed(String),
}

/// Starting or bench player from the `lineup` frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineupPlayer {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub shirt_number: Option<u32>,
    /// Short position code (GK, CB, LM, ST, ...)
    #[serde(default)]
    pub position: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub team: Option<Side>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lineup {
    #[serde(default)]
    pub home: Vec<LineupPlayer>,
    #[serde(default)]
    pub away: Vec<LineupPlayer>,
    #[serde(default)]
    pub home_bench: Vec<LineupPlayer>,
    #[serde(default)]
    pub away_bench: Vec<LineupPlayer>,
}

/// Payload of `half_time` / `full_time`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseMarker {
    pub minute: Option<u32>,
    pub score: Option<Score>,
    pub stats: Option<MatchStats>,
    pub commentary: String,
}

/// `error` payload: either a bare string or `{"message": ..}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Text(String),
    Object { message: String },
}

/// A decoded frame of the engine stream
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Lineup(Lineup),
    Minute(Tick),
    Goal(MatchEvent),
    Card(MatchEvent),
    HalfTime(PhaseMarker),
    FullTime(PhaseMarker),
    Error(String),
}

impl StreamFrame {
    /// Build a frame from its event name and JSON payload
    pub fn from_parts(name: &str, data: &str) -> Result<Self, FrameError> {
        let name = name.trim();
        let name = name.strip_prefix("match:").unwrap_or(name);
        let invalid = |source: serde_json::Error| FrameError::InvalidPayload {
            event: name.to_string(),
            source,
        };

        let frame = match name {
            "lineup" => Self::Lineup(serde_json::from_str(data).map_err(invalid)?),
            "minute" => Self::Minute(serde_json::from_str(data).map_err(invalid)?),
            "goal" => Self::Goal(serde_json::from_str(data).map_err(invalid)?),
            "card" => Self::Card(serde_json::from_str(data).map_err(invalid)?),
            "half_time" => Self::HalfTime(serde_json::from_str(data).map_err(invalid)?),
            "full_time" => Self::FullTime(serde_json::from_str(data).map_err(invalid)?),
            "error" => {
                let payload: ErrorPayload = serde_json::from_str(data).map_err(invalid)?;
                match payload {
                    ErrorPayload::Text(message) | ErrorPayload::Object { message } => {
                        Self::Error(message)
                    }
                }
            }
            other => return Err(FrameError::UnknownEvent(other.to_string())),
        };

        Ok(frame)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Lineup(_) => "lineup",
            Self::Minute(_) => "minute",
            Self::Goal(_) => "goal",
            Self::Card(_) => "card",
            Self::HalfTime(_) => "half_time",
            Self::FullTime(_) => "full_time",
            Self::Error(_) => "error",
        }
    }
}

/// Encode one frame in stream format
pub fn encode_frame<T: Serialize>(event: &str, payload: &T) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string(payload)?;
    Ok(format!("event: {}\ndata: {}\n\n", event, data))
}

/// Frame-level decode failures (the frame is skipped, the stream continues)
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown stream event: {0}")]
    UnknownEvent(String),

    #[error("frame has no data line")]
    MissingData,

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid {event} payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
