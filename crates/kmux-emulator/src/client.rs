//! The emulator remote-control adapter (spec §4.3): calls the emulator's
//! `@`-prefixed remote-control CLI and parses its JSON. Modelled on the
//! `Multiplexer` trait shape — a small synchronous interface implementations
//! can fake out in daemon tests — but returning this system's own error type
//! instead of an opaque `anyhow::Error`.

use std::collections::BTreeMap;
use std::process::Command;

use kmux_model::LayoutKind;

use crate::errors::EmulatorError;
use crate::state::{OsWindowState, parse_state};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchType {
    Window,
    Tab,
    OsWindow,
    Background,
}

impl LaunchType {
    fn as_str(self) -> &'static str {
        match self {
            LaunchType::Window => "window",
            LaunchType::Tab => "tab",
            LaunchType::OsWindow => "os-window",
            LaunchType::Background => "background",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitLocation {
    Vsplit,
    Hsplit,
    First,
    After,
    Before,
    Neighbor,
    Last,
}

impl SplitLocation {
    fn as_str(self) -> &'static str {
        match self {
            SplitLocation::Vsplit => "vsplit",
            SplitLocation::Hsplit => "hsplit",
            SplitLocation::First => "first",
            SplitLocation::After => "after",
            SplitLocation::Before => "before",
            SplitLocation::Neighbor => "neighbor",
            SplitLocation::Last => "last",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOpts {
    pub launch_type: LaunchType,
    pub cwd: Option<String>,
    pub title: Option<String>,
    pub location: Option<SplitLocation>,
    pub bias: Option<u8>,
    pub argv: Option<Vec<String>>,
    pub tags: BTreeMap<String, String>,
}

impl LaunchOpts {
    pub fn new(launch_type: LaunchType) -> Self {
        LaunchOpts {
            launch_type,
            cwd: None,
            title: None,
            location: None,
            bias: None,
            argv: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_location(mut self, location: SplitLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_bias(mut self, bias: u8) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn with_argv(mut self, argv: Vec<String>) -> Self {
        self.argv = Some(argv);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Everything the daemon needs from the emulator. Implementations must be
/// `Send + Sync` so the daemon can hold one behind an `Arc`.
pub trait Emulator: Send + Sync {
    fn get_state(&self) -> Result<Vec<OsWindowState>, EmulatorError>;
    fn launch(&self, opts: &LaunchOpts) -> Result<u64, EmulatorError>;
    fn focus_window(&self, id: u64) -> Result<(), EmulatorError>;
    fn focus_tab(&self, id: u64) -> Result<(), EmulatorError>;
    fn close_window(&self, id: u64) -> Result<(), EmulatorError>;
    fn close_tab(&self, id: u64) -> Result<(), EmulatorError>;
    fn goto_layout(&self, kind: LayoutKind) -> Result<(), EmulatorError>;
}

/// Drives the real emulator binary (`kitten` by default) via its remote
/// control protocol.
#[derive(Debug, Clone)]
pub struct EmulatorClient {
    binary: String,
}

impl Default for EmulatorClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatorClient {
    pub fn new() -> Self {
        EmulatorClient {
            binary: "kitten".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        EmulatorClient {
            binary: binary.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, EmulatorError> {
        let output = Command::new(&self.binary).arg("@").args(args).output()?;
        if !output.status.success() {
            return Err(EmulatorError::CommandFailed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn match_id(id: u64) -> String {
        format!("id:{id}")
    }
}

impl Emulator for EmulatorClient {
    fn get_state(&self) -> Result<Vec<OsWindowState>, EmulatorError> {
        let stdout = self.run(&["ls"])?;
        parse_state(&stdout)
    }

    fn launch(&self, opts: &LaunchOpts) -> Result<u64, EmulatorError> {
        let mut args: Vec<String> = vec![
            "launch".to_string(),
            "--type".to_string(),
            opts.launch_type.as_str().to_string(),
        ];
        if let Some(cwd) = &opts.cwd {
            args.push("--cwd".to_string());
            args.push(cwd.clone());
        }
        if let Some(title) = &opts.title {
            args.push("--title".to_string());
            args.push(title.clone());
        }
        if let Some(location) = opts.location {
            args.push("--location".to_string());
            args.push(location.as_str().to_string());
        }
        if let Some(bias) = opts.bias {
            args.push("--bias".to_string());
            args.push(bias.to_string());
        }
        for (key, value) in &opts.tags {
            args.push("--var".to_string());
            args.push(format!("{key}={value}"));
        }
        if let Some(argv) = &opts.argv {
            args.push("--".to_string());
            args.extend(argv.iter().cloned());
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(&arg_refs)?;
        let trimmed = stdout.trim();
        trimmed
            .parse::<u64>()
            .map_err(|_| EmulatorError::MalformedWindowId(trimmed.to_string()))
    }

    fn focus_window(&self, id: u64) -> Result<(), EmulatorError> {
        self.run(&["focus-window", "--match", &Self::match_id(id)])?;
        Ok(())
    }

    fn focus_tab(&self, id: u64) -> Result<(), EmulatorError> {
        self.run(&["focus-tab", "--match", &Self::match_id(id)])?;
        Ok(())
    }

    fn close_window(&self, id: u64) -> Result<(), EmulatorError> {
        self.run(&["close-window", "--match", &Self::match_id(id)])?;
        Ok(())
    }

    fn close_tab(&self, id: u64) -> Result<(), EmulatorError> {
        self.run(&["close-tab", "--match", &Self::match_id(id)])?;
        Ok(())
    }

    fn goto_layout(&self, kind: LayoutKind) -> Result<(), EmulatorError> {
        self.run(&["goto-layout", kind.emulator_name()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_opts_builder() {
        let opts = LaunchOpts::new(LaunchType::Window)
            .with_cwd("/tmp")
            .with_location(SplitLocation::Vsplit)
            .with_bias(70)
            .with_tag("kmux_session", "demo");
        assert_eq!(opts.cwd.as_deref(), Some("/tmp"));
        assert_eq!(opts.location, Some(SplitLocation::Vsplit));
        assert_eq!(opts.bias, Some(70));
        assert_eq!(opts.tags.get("kmux_session").map(String::as_str), Some("demo"));
    }

    #[test]
    fn test_run_nonexistent_binary_is_io_error() {
        let client = EmulatorClient::with_binary("kmux-nonexistent-binary-xyz");
        let err = client.get_state().unwrap_err();
        assert_eq!(err.error_code(), "io_error");
    }
}
