//! The restore engine (spec §4.7): replays a saved [`Session`]'s tabs, one at
//! a time, into the emulator — simple auto-arranged layouts, single-window
//! tabs, and the two-pass `splits` split-tree algorithm.

use std::path::Path;

use kmux_agent::attach_command;
use kmux_emulator::{Emulator, LaunchOpts, LaunchType, SplitLocation};
use kmux_model::{LayoutKind, Session, SplitNode, Tab, Window, agent_name_for};

use crate::errors::RestoreError;

/// A window the engine created, with the agent it is backed by. The daemon
/// uses this pair to populate `win_to_agent`/`win_to_session`/`agent_to_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWindow {
    pub window_id: u64,
    pub agent_name: String,
}

/// Everything the restore of one `Session` produced, across all its tabs.
#[derive(Debug, Clone, Default)]
pub struct RestoreResult {
    pub windows: Vec<CreatedWindow>,
    pub first_window_id: Option<u64>,
}

/// Parameters that apply to an entire restore call, not to any one tab.
pub struct RestoreContext<'a> {
    pub emulator: &'a dyn Emulator,
    /// Path the generated attach-command wrapper notifies on window exit.
    pub daemon_socket: &'a Path,
    /// If set, the first tab of the restore is created with location
    /// `before`, relative to this currently-pinned, currently-focused tab
    /// (spec §4.7 "pinned-tab marker").
    pub pinned_tab_id: Option<u64>,
}

/// Replay every tab of `session` into the emulator, in order.
pub fn restore_session(
    ctx: &RestoreContext,
    session: &Session,
) -> Result<RestoreResult, RestoreError> {
    let mut result = RestoreResult::default();
    for (tab_idx, tab) in session.tabs.iter().enumerate() {
        let pin_this_tab = tab_idx == 0 && ctx.pinned_tab_id.is_some();
        if pin_this_tab {
            // Focus the pinned tab first so the emulator's `before` location
            // is resolved relative to it (spec §4.7).
            ctx.emulator.focus_tab(ctx.pinned_tab_id.unwrap())?;
        }
        let tab_result = restore_tab(ctx, session, tab_idx, tab, pin_this_tab)?;
        if result.first_window_id.is_none() {
            result.first_window_id = tab_result.first_window_id;
        }
        result.windows.extend(tab_result.windows);
    }
    Ok(result)
}

struct TabResult {
    windows: Vec<CreatedWindow>,
    first_window_id: Option<u64>,
}

fn agent_for(session_name: &str, tab_idx: usize, window_idx: usize, window: &Window) -> String {
    if window.agent_name.is_empty() {
        agent_name_for(session_name, tab_idx, window_idx)
    } else {
        window.agent_name.clone()
    }
}

fn inner_command(window: &Window) -> Option<&str> {
    if window.command.is_empty() {
        None
    } else {
        Some(window.command.as_str())
    }
}

/// Build the `LaunchOpts` common to every window: cwd, attach-command argv,
/// and the `kmux_session`/`kmux_agent`/`kmux_host` tags (spec §4.6, §6).
fn base_opts(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    window_idx: usize,
    window: &Window,
    launch_type: LaunchType,
) -> (LaunchOpts, String) {
    let agent = agent_for(&session.name, tab_idx, window_idx, window);
    let argv = attach_command(&agent, &session.name, inner_command(window), ctx.daemon_socket);

    let mut opts = LaunchOpts::new(launch_type)
        .with_cwd(window.cwd.clone())
        .with_argv(argv)
        .with_tag("kmux_session", session.name.clone())
        .with_tag("kmux_agent", agent.clone());
    if !session.is_local() {
        opts = opts.with_tag("kmux_host", session.host.clone());
    }
    (opts, agent)
}

fn launch(ctx: &RestoreContext, opts: LaunchOpts, agent: String) -> Result<CreatedWindow, RestoreError> {
    let window_id = ctx.emulator.launch(&opts)?;
    Ok(CreatedWindow { window_id, agent_name: agent })
}

/// Create the first window of a tab as a new tab (launch type `tab`).
fn launch_tab_window(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    window_idx: usize,
    window: &Window,
    title: &str,
    pinned: bool,
) -> Result<CreatedWindow, RestoreError> {
    let (mut opts, agent) = base_opts(ctx, session, tab_idx, window_idx, window, LaunchType::Tab);
    opts.title = Some(title.to_string());
    if pinned {
        opts = opts.with_location(SplitLocation::Before);
    }
    launch(ctx, opts, agent)
}

/// Create an additional window in a simple (emulator-auto-arranged) layout.
fn launch_plain_window(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    window_idx: usize,
    window: &Window,
) -> Result<CreatedWindow, RestoreError> {
    let (opts, agent) = base_opts(ctx, session, tab_idx, window_idx, window, LaunchType::Window);
    launch(ctx, opts, agent)
}

/// Create a window via an explicit split at `location`/`bias` against the
/// currently focused window (spec §4.7 Pass 2).
fn launch_split_window(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    window_idx: usize,
    window: &Window,
    location: SplitLocation,
    bias: u8,
) -> Result<CreatedWindow, RestoreError> {
    let (mut opts, agent) = base_opts(ctx, session, tab_idx, window_idx, window, LaunchType::Window);
    opts = opts.with_location(location).with_bias(bias);
    launch(ctx, opts, agent)
}

fn restore_tab(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    tab: &Tab,
    pinned: bool,
) -> Result<TabResult, RestoreError> {
    let Some(first_window) = tab.windows.first() else {
        return Err(RestoreError::EmptyTab(tab_idx));
    };

    // Single-window tabs are always a lone `tab` launch, regardless of
    // layout_kind (spec §4.7).
    if tab.windows.len() == 1 {
        let win = launch_tab_window(ctx, session, tab_idx, 0, first_window, &tab.title, pinned)?;
        let id = win.window_id;
        return Ok(TabResult {
            windows: vec![win],
            first_window_id: Some(id),
        });
    }

    if let Some(root) = &tab.split_root {
        return restore_splits_tab(ctx, session, tab_idx, tab, root, pinned);
    }

    if !tab.layout_kind.is_simple() {
        return Err(RestoreError::MissingSplitRoot(tab_idx));
    }

    // Simple layout: first window opens the tab, goto_layout arranges the
    // rest, then every other window is launched plain and the emulator
    // places it automatically (spec §4.7).
    let mut windows = Vec::with_capacity(tab.windows.len());
    let first = launch_tab_window(ctx, session, tab_idx, 0, first_window, &tab.title, pinned)?;
    let first_id = first.window_id;
    windows.push(first);

    ctx.emulator.goto_layout(tab.layout_kind)?;

    for (window_idx, window) in tab.windows.iter().enumerate().skip(1) {
        windows.push(launch_plain_window(ctx, session, tab_idx, window_idx, window)?);
    }

    Ok(TabResult {
        windows,
        first_window_id: Some(first_id),
    })
}

/// What to do for the first window encountered while descending a subtree's
/// first-child spine: either it opens a brand-new tab, or it was already
/// created by the split that led into this subtree (spec §4.7 Pass 1/Pass 2,
/// expressed here as one recursive function rather than two separate walks).
enum SpineStart {
    NewTab { title: String, pinned: bool },
    AlreadyCreated(CreatedWindow),
}

fn restore_splits_tab(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    tab: &Tab,
    root: &SplitNode,
    pinned: bool,
) -> Result<TabResult, RestoreError> {
    let start = SpineStart::NewTab {
        title: tab.title.clone(),
        pinned,
    };
    let (spine_first, windows) = restore_node(ctx, session, tab_idx, tab, root, start)?;
    Ok(TabResult {
        first_window_id: Some(spine_first.window_id),
        windows,
    })
}

/// Recursive core of the two-pass split restore.
///
/// Pass 1 (spine): always descend into `children[0]` first, carrying
/// `start` down until a leaf consumes it — that is the tab's first window,
/// or a window a split further up already created for us.
///
/// Pass 2 (fill): after the first-child spine returns, focus its leaf and
/// split off the second child, at the direction/bias this node carries
/// (inverted, since the emulator's bias is for the *new* window while ours
/// is for the first child) — then recurse into the second child the same
/// way, since it is itself a fresh spine to walk.
fn restore_node(
    ctx: &RestoreContext,
    session: &Session,
    tab_idx: usize,
    tab: &Tab,
    node: &SplitNode,
    start: SpineStart,
) -> Result<(CreatedWindow, Vec<CreatedWindow>), RestoreError> {
    match node {
        SplitNode::Leaf { window_idx } => {
            let window = &tab.windows[*window_idx];
            let created = match start {
                SpineStart::NewTab { title, pinned } => {
                    launch_tab_window(ctx, session, tab_idx, *window_idx, window, &title, pinned)?
                }
                SpineStart::AlreadyCreated(w) => w,
            };
            Ok((created.clone(), vec![created]))
        }
        SplitNode::Internal {
            horizontal,
            bias,
            children,
        } => {
            let (spine_leaf, mut created) =
                restore_node(ctx, session, tab_idx, tab, &children[0], start)?;

            ctx.emulator.focus_window(spine_leaf.window_id)?;

            let location = if *horizontal {
                SplitLocation::Vsplit
            } else {
                SplitLocation::Hsplit
            };
            let bias_new_window = ((1.0 - bias) * 100.0).round().clamp(0.0, 100.0) as u8;

            // The second child's own first-child spine tells us which saved
            // window index the split's new window represents.
            let second_window_idx = children[1]
                .leaf_indices()
                .first()
                .copied()
                .expect("internal node always has at least one leaf");
            let second_window = &tab.windows[second_window_idx];
            let new_window = launch_split_window(
                ctx,
                session,
                tab_idx,
                second_window_idx,
                second_window,
                location,
                bias_new_window,
            )?;

            let (_, mut second_created) = restore_node(
                ctx,
                session,
                tab_idx,
                tab,
                &children[1],
                SpineStart::AlreadyCreated(new_window),
            )?;
            created.append(&mut second_created);

            Ok((spine_leaf, created))
        }
    }
}
