//! Match playback: turns engine ticks into continuous on-pitch motion

pub mod direction;
pub mod effects;
pub mod geometry;
pub mod roster;
pub mod scheduler;
pub mod snapshot;
pub mod targets;
pub mod timing;
pub mod view;

pub use geometry::Point;
pub use scheduler::{ArmedTimer, PlaybackPhase, SequenceScheduler};
pub use snapshot::RenderFrame;
pub use view::{ViewCommand, ViewHandle, ViewRegistry};
