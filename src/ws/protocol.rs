//! WebSocket protocol message definitions
//! These are the wire types between the server and rendering surfaces

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::playback::RenderFrame;

/// Messages sent from a rendering surface to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Ask for the latest frame right away
    Resync,
}

/// Messages sent from server to a rendering surface
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg<'a> {
    /// Welcome message after connection
    Welcome { view_id: Uuid, server_time: u64 },

    /// A render frame
    Frame { frame: &'a RenderFrame },

    /// Pong response
    Pong {
        /// Echoed client timestamp
        t: u64,
        server_time: u64,
    },

    /// The view was unmounted; the socket closes next
    ViewClosed { view_id: Uuid },
}
