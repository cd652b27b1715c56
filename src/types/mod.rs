//! Shared event model used by all engine components.

pub mod event;

pub use event::{
    EventStatus, EventType, RawSecurityEvent, ResponseAction, SecurityEvent, MAX_SEVERITY,
    MIN_SEVERITY,
};
