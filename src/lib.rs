//! Substrate system-event monitor.
//!
//! Shared library modules for the `substrate-events` binary; the event
//! formatting and dispatch logic is usable without a live node.

pub mod chain;
pub mod config;
pub mod monitor;
