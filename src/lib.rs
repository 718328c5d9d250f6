//! rulebus — a vehicle-bus rule engine for embedded modules.
//!
//! Decodes signals out of raw bus frames, evaluates uploaded rules against
//! them and fires host-registered capability handlers. Rulesets arrive as
//! validated binary payloads over a thin text protocol; hardware concerns
//! (bus driver, transport, persistent storage) stay behind the port traits
//! in [`app::ports`] so the whole core runs host-side for tests.

#![deny(unused_must_use)]

pub mod app;
pub mod can;
pub mod config;
pub mod engine;
pub mod wire;

mod error;

pub use error::{Error, LoadError, Result};
