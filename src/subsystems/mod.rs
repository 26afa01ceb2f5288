//! Subsystems
//!
//! - `navigation`: great-circle distance shared by the rules
//! - `tracker`: the orchestrator that ties GPS, modem and telemetry together

pub mod navigation;
pub mod tracker;
