//! Wire protocol: length-prefixed framed messages over TCP.
//!
//! This crate owns the frame codec and every message payload shape
//! exchanged between coordinator, nodes, and the client. It knows
//! nothing about what a node or coordinator *does* with a message.

pub mod frame;
pub mod kind;
pub mod messages;

pub use frame::{read_body, read_frame, write_body, write_frame, FrameError, RawFrame};
pub use kind::MessageKind;
