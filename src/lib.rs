// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! nofan: a laptop fan control daemon.
//!
//! The daemon samples CPU temperature once per second, smooths it into a
//! weighted signal, picks a slot on a breakpoint curve with hysteresis and
//! drives the embedded controller through `ectool`. A small control plane on
//! a Unix socket answers `status`, `pause` and `resume`.

pub mod actuator;
pub mod client;
pub mod config;
pub mod controller;
pub mod curve;
pub mod daemon;
pub mod history;
pub mod logging;
pub mod protocol;
pub mod sensors;
pub mod slot;
