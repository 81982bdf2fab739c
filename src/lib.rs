//! Per-channel music queues for Discord voice channels.
//!
//! The [`audio`] module is the orchestrator and has no Discord dependency
//! beyond channel ids; [`bot`] wires it to serenity and songbird.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod storage;
pub mod ui;
