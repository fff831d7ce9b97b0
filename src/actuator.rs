// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Embedded controller fan actuation.
//!
//! The daemon drives the fan through an external `ectool` executable. A dry
//! run actuator stands in for it when `NOFAN_DRYRUN` is set.

use std::io;
use std::process::Command;

pub const DEFAULT_PROGRAM: &str = "ectool";

/// Applies fan duty commands. Implementations report failures to the
/// caller, which logs them and carries on.
pub trait Actuator: Send + Sync {
    /// Set an absolute duty cycle percentage (0-100).
    fn set_duty(&self, percent: u8) -> io::Result<()>;

    /// Hand fan control back to the firmware.
    fn set_auto(&self) -> io::Result<()>;
}

/// Runs `ectool fanduty <percent>` / `ectool autofanctrl`.
#[derive(Debug, Clone)]
pub struct EcTool {
    program: String,
}

impl EcTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> io::Result<()> {
        let output = Command::new(&self.program).args(args).output()?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(io::Error::other(format!(
            "{} {} exited with {}: {}",
            self.program,
            args.join(" "),
            output.status,
            stderr.trim()
        )))
    }
}

impl Default for EcTool {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl Actuator for EcTool {
    fn set_duty(&self, percent: u8) -> io::Result<()> {
        self.run(&["fanduty", &percent.to_string()])
    }

    fn set_auto(&self) -> io::Result<()> {
        self.run(&["autofanctrl"])
    }
}

/// Logs the command it would have issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

impl Actuator for DryRun {
    fn set_duty(&self, percent: u8) -> io::Result<()> {
        log::info!("dry run: fanduty {percent}");
        Ok(())
    }

    fn set_auto(&self) -> io::Result<()> {
        log::info!("dry run: autofanctrl");
        Ok(())
    }
}

/// Pick the actuator for the given settings.
pub fn select(program: &str, dry_run: bool) -> Box<dyn Actuator> {
    if dry_run {
        log::info!("Dry run enabled, fan commands will only be logged");
        Box::new(DryRun)
    } else {
        Box::new(EcTool::new(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_an_error() {
        let tool = EcTool::new("/nonexistent/ectool");
        assert!(tool.set_duty(50).is_err());
        assert!(tool.set_auto().is_err());
    }

    #[test]
    fn test_failing_program_is_an_error() {
        let tool = EcTool::new("false");
        assert!(tool.set_duty(50).is_err());
    }

    #[test]
    fn test_successful_program() {
        let tool = EcTool::new("true");
        assert!(tool.set_duty(50).is_ok());
        assert!(tool.set_auto().is_ok());
    }

    #[test]
    fn test_dry_run_always_succeeds() {
        assert!(select("/nonexistent/ectool", true).set_duty(30).is_ok());
        assert!(DryRun.set_auto().is_ok());
    }
}
