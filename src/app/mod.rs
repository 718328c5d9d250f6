//! Application layer: the controller, its port traits, the text command
//! protocol and lifecycle events. Everything here is host-agnostic; the
//! target binary supplies port implementations and the loop.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

pub use commands::Command;
pub use events::AppEvent;
pub use service::Controller;
