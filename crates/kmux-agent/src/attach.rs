//! `attach_command` (spec §4.4): a pure function from agent/session names to
//! the argv the emulator should launch to create a window backed by that
//! agent. No I/O — the daemon feeds the result straight to
//! `Emulator::launch`.

use std::path::Path;

fn quote_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Build the argv for a window that attaches to `agent_name` (creating the
/// agent session if absent), optionally runs `inner_command` in a login
/// shell, and on exit notifies the daemon over `daemon_socket` so it can
/// learn the window is gone (IPC `notify_close`, §6).
///
/// `$KITTY_WINDOW_ID` in the generated script is expanded by the shell that
/// ends up running *inside* the newly created window, at the point the
/// trap fires — not by this function, which only builds argv.
pub fn attach_command(
    agent_name: &str,
    session_name: &str,
    inner_command: Option<&str>,
    daemon_socket: &Path,
) -> Vec<String> {
    let notify_request = format!(
        r#"{{"method":"notify_close","params":{{"window_id":$KITTY_WINDOW_ID,"agent_name":"{agent_name}","session":"{session_name}"}}}}"#
    );
    let notify_call = format!(
        "printf '%s\\n' {request} | nc -U {socket} >/dev/null 2>&1 || true",
        request = quote_single(&notify_request),
        socket = quote_single(&daemon_socket.to_string_lossy()),
    );

    let body = match inner_command {
        Some(cmd) if !cmd.is_empty() => format!("{cmd}; exec \"$SHELL\" -l"),
        _ => "exec \"$SHELL\" -l".to_string(),
    };
    let script = format!("trap {} EXIT; {}", quote_single(&notify_call), body);

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());

    vec![
        "tmux".to_string(),
        "new-session".to_string(),
        "-A".to_string(),
        "-s".to_string(),
        agent_name.to_string(),
        shell,
        "-lc".to_string(),
        script,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn socket() -> PathBuf {
        PathBuf::from("/tmp/kmux-1000/default")
    }

    #[test]
    fn test_attach_command_shape() {
        let argv = attach_command("demo.0.0", "demo", None, &socket());
        assert_eq!(argv[0], "tmux");
        assert_eq!(argv[1], "new-session");
        assert_eq!(argv[2], "-A");
        assert_eq!(argv[3], "-s");
        assert_eq!(argv[4], "demo.0.0");
        assert_eq!(argv[6], "-lc");
        let script = &argv[7];
        assert!(script.contains("trap"));
        assert!(script.contains("notify_close"));
        assert!(script.contains("demo.0.0"));
        assert!(script.contains("\"demo\""));
        assert!(script.contains("$KITTY_WINDOW_ID"));
    }

    #[test]
    fn test_attach_command_runs_inner_command_then_falls_back_to_shell() {
        let argv = attach_command("demo.0.0", "demo", Some("vim notes.md"), &socket());
        let script = &argv[7];
        assert!(script.contains("vim notes.md"));
        assert!(script.contains("exec \"$SHELL\" -l"));
    }

    #[test]
    fn test_attach_command_without_inner_command_execs_shell_directly() {
        let argv = attach_command("demo.0.0", "demo", None, &socket());
        let script = &argv[7];
        assert!(script.trim_start().starts_with("trap"));
        assert!(script.ends_with("exec \"$SHELL\" -l"));
    }

    #[test]
    fn test_attach_command_socket_path_is_embedded() {
        let argv = attach_command("demo.0.0", "demo", None, &socket());
        assert!(argv[7].contains("/tmp/kmux-1000/default"));
    }
}
