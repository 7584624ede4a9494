//! In-process peer transport.
//!
//! Implements the transport contract the session layer negotiates against:
//! description exchange, track attachment, codec capability enumeration and
//! preference, connectivity notifications and a frame pump that pulls
//! media from attached tracks once connected.

pub mod local;
pub mod sdp;

pub use local::{LocalTransport, LocalTransportFactory, TransportOptions};
pub use sdp::{build_answer, parse_media_sections, MediaSection};
