//! Engine stream: wire protocol, incremental decoding, HTTP follower

pub mod client;
pub mod decoder;
pub mod protocol;

pub use client::{StreamClient, StreamError};
pub use decoder::FrameDecoder;
pub use protocol::{FrameError, StreamFrame};
