//! Headings derived from consecutive position samples

use std::collections::HashMap;

use serde::Serialize;

use super::geometry::Point;

/// Movement below this is treated as standing still
pub const MIN_MOVEMENT: f32 = 0.5;

/// Normalized heading plus raw displacement length
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Heading {
    pub dx: f32,
    pub dy: f32,
    pub speed: f32,
}

/// Heading for every agent that moved more than `MIN_MOVEMENT` between the
/// two samples. Stationary agents and agents missing from `previous` are omitted.
pub fn compute_direction_vectors(
    previous: &HashMap<u32, Point>,
    current: &HashMap<u32, Point>,
) -> HashMap<u32, Heading> {
    current
        .iter()
        .filter_map(|(id, now)| {
            let before = previous.get(id)?;
            let dx = now.x - before.x;
            let dy = now.y - before.y;
            let len = (dx * dx + dy * dy).sqrt();
            (len > MIN_MOVEMENT).then(|| {
                (
                    *id,
                    Heading {
                        dx: dx / len,
                        dy: dy / len,
                        speed: len,
                    },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(from: (f32, f32), to: (f32, f32)) -> Option<Heading> {
        let prev = HashMap::from([(1, Point::new(from.0, from.1))]);
        let cur = HashMap::from([(1, Point::new(to.0, to.1))]);
        compute_direction_vectors(&prev, &cur).get(&1).copied()
    }

    #[test]
    fn diagonal_move() {
        let h = single((40.0, 40.0), (45.0, 42.0)).expect("moved");
        assert!(h.dx > 0.0 && h.dy > 0.0);
        assert!(h.speed > 0.5);
        assert!(((h.dx * h.dx + h.dy * h.dy) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn tiny_move_is_stationary() {
        assert!(single((40.0, 40.0), (40.1, 40.1)).is_none());
    }

    #[test]
    fn straight_run() {
        let h = single((20.0, 50.0), (30.0, 50.0)).expect("moved");
        assert!((h.dx - 1.0).abs() < 1e-5);
        assert!(h.dy.abs() < 1e-5);
        assert!((h.speed - 10.0).abs() < 1e-4);
    }

    #[test]
    fn new_agents_have_no_heading() {
        let prev = HashMap::new();
        let cur = HashMap::from([(5, Point::new(10.0, 10.0))]);
        assert!(compute_direction_vectors(&prev, &cur).is_empty());
    }
}
