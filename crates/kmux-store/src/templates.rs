//! Layout templates (spec ยง4.2): YAML documents describing a [`Session`]
//! skeleton. A small set ships embedded in the binary and is installed
//! lazily into the user's templates directory on first run; installation
//! never overwrites a file the user may have already customized.

use std::fs;

use kmux_model::{LayoutKind, Session, SplitNode, Tab, Window};
use kmux_paths::KmuxPaths;
use serde::Deserialize;

use crate::errors::StoreError;

const EMBEDDED: &[(&str, &str)] = &[
    ("simple", include_str!("../templates/simple.yaml")),
    ("dev", include_str!("../templates/dev.yaml")),
];

#[derive(Debug, Deserialize)]
struct TemplateFile {
    tabs: Vec<TemplateTab>,
}

#[derive(Debug, Deserialize)]
struct TemplateTab {
    title: String,
    layout: LayoutKind,
    panes: Vec<TemplatePane>,
    #[serde(default)]
    split_root: Option<SplitNode>,
}

#[derive(Debug, Deserialize, Default)]
struct TemplatePane {
    #[serde(default)]
    command: String,
}

/// Install every embedded template into `paths.templates_dir()`, skipping
/// any file that already exists.
pub fn install_defaults(paths: &KmuxPaths) -> Result<(), StoreError> {
    let dir = paths.templates_dir();
    fs::create_dir_all(&dir)?;
    for (name, contents) in EMBEDDED {
        let path = paths.template_file(name);
        if path.exists() {
            continue;
        }
        fs::write(&path, contents)?;
        tracing::info!(event = "store.template.installed", template = %name);
    }
    Ok(())
}

/// Instantiate a template as a fresh [`Session`] named `name`, hosted on
/// `host`, with every window's `cwd` set to `cwd`.
pub fn instantiate(
    paths: &KmuxPaths,
    template_name: &str,
    name: &str,
    host: &str,
    cwd: &str,
) -> Result<Session, StoreError> {
    let path = paths.template_file(template_name);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::TemplateNotFound(template_name.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let file: TemplateFile = serde_yaml::from_str(&contents)?;

    let mut session = Session::new(name, host);
    for t in file.tabs {
        let windows = t
            .panes
            .into_iter()
            .map(|p| Window {
                cwd: cwd.to_string(),
                command: p.command,
                agent_name: String::new(),
                ephemeral: false,
            })
            .collect();
        session.tabs.push(Tab {
            title: t.title,
            layout_kind: t.layout,
            windows,
            split_root: t.split_root,
        });
    }
    Ok(session)
}
