//! Match playback server
//!
//! Consumes a match engine's text frame stream and turns each simulated
//! minute into continuous, bounded motion for 22 agents and a ball. One
//! playback task runs per mounted view; rendering surfaces read frames over
//! HTTP or receive them over a WebSocket.

pub mod app;
pub mod config;
pub mod http;
pub mod playback;
pub mod stream;
pub mod util;
pub mod ws;
