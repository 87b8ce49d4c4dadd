//! Unit tests for the lifecycle engine.
//!
//! Every test drives the engine over a [`ScriptedTransport`] with millisecond
//! poll intervals, so a full wizard run completes instantly.

mod create;
mod reference;
