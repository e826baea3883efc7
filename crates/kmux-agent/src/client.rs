//! The persistence-agent adapter (spec §4.4): list/kill of live agent
//! sessions. One instance is bound to a single host; the local adapter runs
//! through a login shell so the user's `PATH` is loaded, the remote adapter
//! prefixes every command with an SSH invocation to a configured alias.

use std::process::Command;

use crate::errors::AgentError;

const EMPTY_SIGNALS: &[&str] = &["no server running", "no sessions", "no current session"];

/// Parse a `list`-style output: one agent name per line, optionally
/// followed by whitespace and a status annotation. Lines whose status
/// marks a transitional "cleaning up" state are dropped (spec §4.4).
fn parse_list_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.contains("(cleaning up)"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

fn is_empty_signal(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    EMPTY_SIGNALS.iter().any(|s| lower.contains(s))
}

/// Everything the daemon needs from the persistence agent.
pub trait Agent: Send + Sync {
    fn list(&self) -> Result<Vec<String>, AgentError>;
    fn kill(&self, agent_name: &str) -> Result<(), AgentError>;
}

/// Drives the agent CLI on the local host through a login shell.
#[derive(Debug, Clone)]
pub struct LocalAgentClient {
    binary: String,
}

impl Default for LocalAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAgentClient {
    pub fn new() -> Self {
        LocalAgentClient {
            binary: "tmux".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        LocalAgentClient {
            binary: binary.into(),
        }
    }

    fn login_shell(&self, args: &[&str]) -> Result<String, AgentError> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let command_line = format!("{} {}", self.binary, args.join(" "));
        let output = Command::new(shell).arg("-lc").arg(&command_line).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AgentError::CommandFailed { stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Agent for LocalAgentClient {
    fn list(&self) -> Result<Vec<String>, AgentError> {
        match self.login_shell(&["list-sessions", "-F", "'#S'"]) {
            Ok(stdout) => Ok(parse_list_output(&stdout)),
            Err(AgentError::CommandFailed { stderr }) if is_empty_signal(&stderr) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn kill(&self, agent_name: &str) -> Result<(), AgentError> {
        self.login_shell(&["kill-session", "-t", agent_name])?;
        Ok(())
    }
}

/// Drives the agent CLI on a remote host over SSH.
#[derive(Debug, Clone)]
pub struct RemoteAgentClient {
    host_alias: String,
    binary: String,
}

impl RemoteAgentClient {
    pub fn new(host_alias: impl Into<String>) -> Self {
        RemoteAgentClient {
            host_alias: host_alias.into(),
            binary: "tmux".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn ssh(&self, remote_command: &str) -> Result<String, AgentError> {
        let output = Command::new("ssh")
            .arg(&self.host_alias)
            .arg(remote_command)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AgentError::CommandFailed { stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Agent for RemoteAgentClient {
    fn list(&self) -> Result<Vec<String>, AgentError> {
        let remote_command = format!("{} list-sessions -F '#S'", self.binary);
        match self.ssh(&remote_command) {
            Ok(stdout) => Ok(parse_list_output(&stdout)),
            Err(AgentError::CommandFailed { stderr }) if is_empty_signal(&stderr) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn kill(&self, agent_name: &str) -> Result<(), AgentError> {
        let remote_command = format!("{} kill-session -t {agent_name}", self.binary);
        self.ssh(&remote_command)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_output_splits_lines() {
        let out = parse_list_output("demo.0.0\nprod.0.0\n");
        assert_eq!(out, vec!["demo.0.0", "prod.0.0"]);
    }

    #[test]
    fn test_parse_list_output_filters_cleaning_up() {
        let out = parse_list_output("demo.0.0\nstray.0.0 (cleaning up)\nprod.0.0\n");
        assert_eq!(out, vec!["demo.0.0", "prod.0.0"]);
    }

    #[test]
    fn test_parse_list_output_empty_input() {
        assert!(parse_list_output("").is_empty());
    }

    #[test]
    fn test_is_empty_signal_matches_no_server_running() {
        assert!(is_empty_signal("error: no server running on /tmp/tmux-1000/default"));
        assert!(!is_empty_signal("session not found: demo"));
    }

    #[test]
    fn test_local_list_tolerates_empty_signal() {
        let client = LocalAgentClient::with_binary("true-nonexistent-binary-xyz; echo 'no server running' 1>&2; exit 1 #");
        // login_shell builds "SHELL -lc '<binary> list-sessions ...'"; craft a binary
        // string that is itself a shell fragment emitting the empty signal.
        let result = client.list();
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }
}
