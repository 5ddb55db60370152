//! Agents on the pitch for one match view

use std::collections::HashMap;

use crate::stream::protocol::{Lineup, LineupPlayer, Side};

use super::geometry::Point;

/// Broad tactical role, derived from the lineup position code
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Role {
    pub fn from_position(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "GK" | "G" => Role::Goalkeeper,
            "CB" | "LB" | "RB" | "LWB" | "RWB" | "SW" | "D" | "DC" | "DL" | "DR" => Role::Defender,
            "ST" | "CF" | "LW" | "RW" | "SS" | "F" | "FC" => Role::Forward,
            _ => Role::Midfielder,
        }
    }
}

/// A player or goalkeeper rendered on the pitch
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: u32,
    pub side: Side,
    pub role: Role,
    pub name: String,
    pub shirt_number: Option<u32>,
    /// Formation slot, owned by the tactics side; playback only reads it
    pub base: Point,
    /// Animated position, owned by the scheduler
    pub pos: Point,
}

impl Agent {
    pub fn new(id: u32, side: Side, role: Role, base: Point) -> Self {
        let base = base.clamped();
        Self {
            id,
            side,
            role,
            name: String::new(),
            shirt_number: None,
            base,
            pos: base,
        }
    }

    fn from_lineup(player: &LineupPlayer, side: Side) -> Self {
        let mut agent = Self::new(
            player.id,
            player.team.unwrap_or(side),
            Role::from_position(&player.position),
            Point::new(player.x, player.y),
        );
        agent.name = player.name.clone();
        agent.shirt_number = player.shirt_number;
        agent
    }

    pub fn is_goalkeeper(&self) -> bool {
        self.role == Role::Goalkeeper
    }
}

/// The starting agents of both sides, in lineup order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    agents: Vec<Agent>,
    index: HashMap<u32, usize>,
}

impl Roster {
    pub fn new(agents: Vec<Agent>) -> Self {
        let index = agents
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
        Self { agents, index }
    }

    /// Starters only; the bench is not drawn
    pub fn from_lineup(lineup: &Lineup) -> Self {
        let agents = lineup
            .home
            .iter()
            .map(|p| Agent::from_lineup(p, Side::Home))
            .chain(lineup.away.iter().map(|p| Agent::from_lineup(p, Side::Away)))
            .collect();
        Self::new(agents)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Agent> {
        self.index.get(&id).map(|&i| &self.agents[i])
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Agent> {
        self.index.get(&id).map(|&i| &mut self.agents[i])
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<&Agent> {
        let name = name.trim();
        self.agents.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut()
    }

    /// Current positions keyed by agent id
    pub fn positions(&self) -> HashMap<u32, Point> {
        self.agents.iter().map(|a| (a.id, a.pos)).collect()
    }

    /// Apply a formation update from the tactics side. Unknown ids are ignored.
    /// Returns how many agents were updated.
    pub fn set_base_positions(&mut self, slots: &[(u32, Point)]) -> usize {
        let mut updated = 0;
        for (id, base) in slots {
            if let Some(agent) = self.get_mut(*id) {
                agent.base = base.clamped();
                updated += 1;
            }
        }
        updated
    }
}
