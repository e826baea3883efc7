use serde::{Deserialize, Serialize};

/// Generate a newtype wrapper around `String` with standard trait impls.
///
/// Each generated type gets: `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`,
/// `Serialize`/`Deserialize` (transparent), `Display`, `Deref<Target=str>`,
/// `AsRef<str>`, `Borrow<str>`, `From<String>`, `From<&str>`.
macro_rules! newtype_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

newtype_string! {
    /// A session's short identifier (e.g. `"demo"`). Validated by
    /// [`crate::validation::is_valid_session_name`] before use in a mutating call.
    SessionName
}

newtype_string! {
    /// A persistence-agent session name, e.g. `"demo.0.1"`. See [`crate::naming`].
    AgentName
}

/// Host a session lives on: `"local"` or an opaque SSH-alias string.
pub const LOCAL_HOST: &str = "local";

/// Identifier for a window in the terminal emulator's tree.
///
/// Emulators such as kitty report window ids as small unsigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for WindowId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// How a tab's windows are arranged when no explicit [`SplitNode`] is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Arbitrary binary split tree — requires `split_root` when there is more
    /// than one window.
    Splits,
    Tall,
    Fat,
    Grid,
    Horizontal,
    Vertical,
    Stack,
}

impl LayoutKind {
    /// The simple, emulator-auto-arranged layouts (everything but `Splits`).
    pub fn is_simple(self) -> bool {
        !matches!(self, LayoutKind::Splits)
    }

    /// The string kitty's `goto-layout` expects.
    pub fn emulator_name(self) -> &'static str {
        match self {
            LayoutKind::Splits => "splits",
            LayoutKind::Tall => "tall",
            LayoutKind::Fat => "fat",
            LayoutKind::Grid => "grid",
            LayoutKind::Horizontal => "horizontal",
            LayoutKind::Vertical => "vertical",
            LayoutKind::Stack => "stack",
        }
    }
}

fn default_bias() -> f64 {
    0.5
}

fn default_horizontal() -> bool {
    true
}

/// A node in a tab's split tree.
///
/// Wire format (save files, spec ยง6): a leaf is `{"window_idx": N}`; an
/// internal node is `{"horizontal": bool, "bias": float, "children": [node, node]}`.
/// This is the model's own save-file shape, distinct from the emulator
/// adapter's polymorphic query-JSON shape (parsed in `kmux-emulator`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SplitNode {
    Leaf {
        window_idx: usize,
    },
    Internal {
        #[serde(default = "default_horizontal")]
        horizontal: bool,
        #[serde(default = "default_bias")]
        bias: f64,
        children: Box<[SplitNode; 2]>,
    },
}

impl SplitNode {
    pub fn leaf(window_idx: usize) -> Self {
        SplitNode::Leaf { window_idx }
    }

    pub fn internal(horizontal: bool, bias: f64, first: SplitNode, second: SplitNode) -> Self {
        SplitNode::Internal {
            horizontal,
            bias,
            children: Box::new([first, second]),
        }
    }

    /// Every leaf's `window_idx`, in tree (left-to-right) order.
    pub fn leaf_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_leaf_indices(&mut out);
        out
    }

    fn collect_leaf_indices(&self, out: &mut Vec<usize>) {
        match self {
            SplitNode::Leaf { window_idx } => out.push(*window_idx),
            SplitNode::Internal { children, .. } => {
                children[0].collect_leaf_indices(out);
                children[1].collect_leaf_indices(out);
            }
        }
    }
}

/// A single pane in the emulator, backed by one persistence-agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub cwd: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub ephemeral: bool,
}

impl Window {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            command: String::new(),
            agent_name: String::new(),
            ephemeral: false,
        }
    }
}

/// A horizontal strip inside the emulator containing one or more windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub title: String,
    pub layout_kind: LayoutKind,
    pub windows: Vec<Window>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_root: Option<SplitNode>,
}

impl Tab {
    /// A single-window tab with the given title and working directory.
    pub fn single(title: impl Into<String>, cwd: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            layout_kind: LayoutKind::Tall,
            windows: vec![Window::new(cwd)],
            split_root: None,
        }
    }

    /// Every leaf index in `split_root` is unique and every window appears
    /// exactly once. See spec ยง3 SplitNode invariants.
    pub fn split_tree_is_well_formed(&self) -> bool {
        let Some(root) = &self.split_root else {
            return true;
        };
        let mut indices = root.leaf_indices();
        if indices.len() != self.windows.len() {
            return false;
        }
        indices.sort_unstable();
        indices.iter().enumerate().all(|(i, &idx)| i == idx)
    }
}

/// A named, host-scoped unit of tabs/windows whose processes outlive any
/// particular emulator window set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub host: String,
    pub saved_at: chrono::DateTime<chrono::Utc>,
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub agent_names: std::collections::BTreeSet<String>,
}

impl Session {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            saved_at: chrono::Utc::now(),
            tabs: Vec::new(),
            agent_names: std::collections::BTreeSet::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.host == LOCAL_HOST
    }
}

/// Status of a session as reported by the state view (spec ยง3, ยง4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Attached,
    Detached,
    Saved,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Attached => write!(f, "attached"),
            SessionStatus::Detached => write!(f, "detached"),
            SessionStatus::Saved => write!(f, "saved"),
        }
    }
}
