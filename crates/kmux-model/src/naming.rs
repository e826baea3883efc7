//! The persistence-agent naming convention (spec ยง3, ยง4.1, ยง6):
//! `<session>.<tab_index>.<window_index>`.
//!
//! These two functions are the sole constructor and decoder of agent names;
//! every crate that needs to build or recognise one goes through them.

/// Build the agent name for a window at `(tab_index, window_index)` in `session`.
pub fn agent_name_for(session: &str, tab_index: usize, window_index: usize) -> String {
    format!("{session}.{tab_index}.{window_index}")
}

/// Extract the session-name prefix from an agent name (the substring before
/// the first `.`). Returns an empty string if the name has no dot, i.e. does
/// not follow the convention.
pub fn parse_session_prefix(agent_name: &str) -> &str {
    match agent_name.find('.') {
        Some(idx) => &agent_name[..idx],
        None => "",
    }
}

/// Parse the full `<session>.<tab_idx>.<window_idx>` triple, when well-formed.
pub fn parse_agent_name(agent_name: &str) -> Option<(&str, usize, usize)> {
    let mut parts = agent_name.splitn(3, '.');
    let session = parts.next()?;
    let tab_idx: usize = parts.next()?.parse().ok()?;
    let window_idx: usize = parts.next()?.parse().ok()?;
    if session.is_empty() {
        return None;
    }
    Some((session, tab_idx, window_idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_name_for() {
        assert_eq!(agent_name_for("demo", 0, 1), "demo.0.1");
    }

    #[test]
    fn test_parse_session_prefix() {
        assert_eq!(parse_session_prefix("demo.0.1"), "demo");
    }

    #[test]
    fn test_parse_session_prefix_no_dot() {
        assert_eq!(parse_session_prefix("stray"), "");
    }

    #[test]
    fn test_parse_session_prefix_dots_in_session_name_take_first() {
        // Session names are validated to exclude dots by convention elsewhere,
        // but the decoder itself only looks at the first dot.
        assert_eq!(parse_session_prefix("a.b.0.1"), "a");
    }

    #[test]
    fn test_round_trip() {
        let name = agent_name_for("demo", 2, 3);
        assert_eq!(parse_session_prefix(&name), "demo");
        assert_eq!(parse_agent_name(&name), Some(("demo", 2, 3)));
    }

    #[test]
    fn test_parse_agent_name_rejects_malformed() {
        assert_eq!(parse_agent_name("no-dots"), None);
        assert_eq!(parse_agent_name("demo.notanumber.1"), None);
        assert_eq!(parse_agent_name(".0.1"), None);
    }
}
