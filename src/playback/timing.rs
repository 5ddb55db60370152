//! Ball timing and flight height

use crate::stream::protocol::{ActionKind, Aerial, Step};

use super::geometry::clamp;

/// Passes longer than this leave the ground
pub const LONG_PASS_DISTANCE: f32 = 25.0;

/// Passes shorter than this use the short-pass timing curve
const SHORT_PASS_DISTANCE: f32 = 20.0;

/// Peak height reached per unit of travel, capped at 1.0
const HEIGHT_PER_UNIT: f32 = 0.015;

/// How long the ball takes to travel a step, in milliseconds.
///
/// `actor_move_ms` is the acting agent's own movement duration; ground dribbles
/// and runs carry the ball with the agent so they share that duration. A raised
/// ball travels on the cross curve whatever the action, unless it was struck.
pub fn ball_transition_duration(
    action: ActionKind,
    aerial: Aerial,
    distance: f32,
    actor_move_ms: u32,
) -> u32 {
    let ms = match action {
        ActionKind::Shoot | ActionKind::Header => clamp(distance * 4.0, 120.0, 280.0),
        ActionKind::Clearance => clamp(distance * 5.0, 150.0, 350.0),
        ActionKind::Cross => clamp(distance * 10.0, 400.0, 700.0),
        _ if aerial.is_raised() => clamp(distance * 10.0, 400.0, 700.0),
        ActionKind::Dribble | ActionKind::Run => return actor_move_ms,
        _ if distance < SHORT_PASS_DISTANCE => clamp(distance * 12.0, 180.0, 350.0),
        _ => clamp(distance * 8.0, 350.0, 600.0),
    };
    ms.round() as u32
}

/// Transition duration for a validated step
pub fn step_transition_duration(step: &Step, actor_move_ms: u32) -> u32 {
    ball_transition_duration(step.action, step.aerial, step.travel(), actor_move_ms)
}

/// Whether the ball leaves the ground for this action
pub fn is_aerial(action: ActionKind, aerial: Aerial, distance: f32) -> bool {
    matches!(
        action,
        ActionKind::Cross | ActionKind::Clearance | ActionKind::Header
    ) || aerial.is_raised()
        || (action == ActionKind::Pass && distance > LONG_PASS_DISTANCE)
}

/// Ball height in `0..=1` at `progress` through the flight.
///
/// Ground balls stay at 0. Aerial balls follow `4p(1-p)` scaled by travel
/// distance, so they peak halfway and land at progress 1.
pub fn ball_height(action: ActionKind, aerial: Aerial, distance: f32, progress: f32) -> f32 {
    if !is_aerial(action, aerial, distance) {
        return 0.0;
    }
    let p = clamp(progress, 0.0, 1.0);
    let peak = (distance * HEIGHT_PER_UNIT).min(1.0);
    4.0 * p * (1.0 - p) * peak
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shot_over_25_units() {
        let ms = ball_transition_duration(ActionKind::Shoot, Aerial::None, 25.0, 500);
        assert!((120..=280).contains(&ms));
        assert_eq!(ms, 120);
    }

    #[test]
    fn cross_is_slow() {
        for d in [5.0, 30.0, 90.0] {
            let ms = ball_transition_duration(ActionKind::Cross, Aerial::None, d, 500);
            assert!((400..=700).contains(&ms), "cross over {d} took {ms}");
        }
    }

    #[test]
    fn lofted_pass_uses_cross_timing() {
        let ms = ball_transition_duration(ActionKind::Pass, Aerial::Lofted, 10.0, 500);
        assert_eq!(ms, 400);
    }

    #[test]
    fn dribble_follows_the_dribbler() {
        assert_eq!(ball_transition_duration(ActionKind::Dribble, Aerial::None, 40.0, 777), 777);
        assert_eq!(ball_transition_duration(ActionKind::Run, Aerial::None, 3.0, 321), 321);
    }

    #[test]
    fn raised_run_uses_cross_timing() {
        assert_eq!(ball_transition_duration(ActionKind::Run, Aerial::High, 3.0, 321), 400);
        assert_eq!(ball_transition_duration(ActionKind::Dribble, Aerial::Lofted, 90.0, 321), 700);
        // Struck balls keep their own curve
        assert_eq!(ball_transition_duration(ActionKind::Shoot, Aerial::High, 25.0, 321), 120);
    }

    #[test]
    fn clearance_range() {
        assert_eq!(ball_transition_duration(ActionKind::Clearance, Aerial::None, 1.0, 0), 150);
        assert_eq!(ball_transition_duration(ActionKind::Clearance, Aerial::None, 100.0, 0), 350);
    }

    #[test]
    fn ground_actions_stay_down() {
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_eq!(ball_height(ActionKind::Pass, Aerial::None, 10.0, p), 0.0);
            assert_eq!(ball_height(ActionKind::Tackle, Aerial::None, 40.0, p), 0.0);
            assert_eq!(ball_height(ActionKind::Dribble, Aerial::None, 40.0, p), 0.0);
        }
    }

    #[test]
    fn aerial_arc_is_symmetric() {
        for action in [ActionKind::Cross, ActionKind::Clearance, ActionKind::Header] {
            let at = |p| ball_height(action, Aerial::None, 40.0, p);
            assert_eq!(at(0.0), 0.0);
            assert!(at(1.0).abs() < 1e-6);
            assert!(at(0.5) >= at(0.25));
            assert!(at(0.5) >= at(0.75));
            assert!((at(0.25) - at(0.75)).abs() < 1e-6);
        }
    }

    #[test]
    fn long_pass_is_aerial() {
        assert!(is_aerial(ActionKind::Pass, Aerial::None, 30.0));
        assert!(!is_aerial(ActionKind::Pass, Aerial::None, 20.0));
        assert!(ball_height(ActionKind::Pass, Aerial::None, 30.0, 0.5) > 0.0);
    }

    #[test]
    fn height_is_capped() {
        let h = ball_height(ActionKind::Clearance, Aerial::None, 200.0, 0.5);
        assert!((h - 1.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn longer_pass_never_faster(a in 0.0f32..120.0, b in 0.0f32..120.0) {
            let (short, long) = if a <= b { (a, b) } else { (b, a) };
            let t_short = ball_transition_duration(ActionKind::Pass, Aerial::None, short, 0);
            let t_long = ball_transition_duration(ActionKind::Pass, Aerial::None, long, 0);
            prop_assert!(t_long >= t_short);
        }

        #[test]
        fn height_within_unit_range(d in 0.0f32..150.0, p in -1.0f32..2.0) {
            let h = ball_height(ActionKind::Cross, Aerial::High, d, p);
            prop_assert!((0.0..=1.0).contains(&h));
        }
    }
}
