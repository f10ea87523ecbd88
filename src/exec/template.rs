// src/exec/template.rs

//! Command templates.

use std::collections::BTreeMap;

use crate::config::ConfigFile;
use crate::exec::backend::ActionRequest;
use crate::types::{valid_time_stamp, ActionKind};

/// Configured command template per action kind, plus per-source regrid
/// overrides.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    by_kind: BTreeMap<ActionKind, String>,
    regrid_by_source: BTreeMap<String, String>,
}

impl CommandTable {
    /// Build the table from `[action]` and `[regrid.source.*]`.
    ///
    /// Degraded variants without their own template fall back to the next
    /// richer one: passthrough to one-source, one-source and two-source to
    /// full. The `{kind}` placeholder tells the tool which variant it is.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let action = &cfg.action;
        let full = action.full.clone();
        let two = action.degraded_two_source.clone().or_else(|| full.clone());
        let one = action.degraded_one_source.clone().or_else(|| full.clone());
        let pass = action.passthrough.clone().or_else(|| one.clone());

        let mut by_kind = BTreeMap::new();
        for (kind, cmd) in [
            (ActionKind::Full, full),
            (ActionKind::DegradedTwoSource, two),
            (ActionKind::DegradedOneSource, one),
            (ActionKind::Passthrough, pass),
            (ActionKind::Regrid, action.regrid.clone()),
        ] {
            if let Some(cmd) = cmd {
                by_kind.insert(kind, cmd);
            }
        }

        let regrid_by_source = cfg
            .regrid
            .iter()
            .flat_map(|r| r.source.iter())
            .filter_map(|(name, src)| src.command.clone().map(|c| (name.clone(), c)))
            .collect();

        Self {
            by_kind,
            regrid_by_source,
        }
    }

    pub fn with_command(mut self, kind: ActionKind, template: impl Into<String>) -> Self {
        self.by_kind.insert(kind, template.into());
        self
    }

    pub fn command_for(&self, request: &ActionRequest) -> Option<&str> {
        if request.kind == ActionKind::Regrid {
            let by_source = request
                .sources
                .first()
                .and_then(|s| self.regrid_by_source.get(s));
            if let Some(cmd) = by_source {
                return Some(cmd);
            }
        }
        self.by_kind.get(&request.kind).map(String::as_str)
    }
}

/// Values substituted into templates and exported as `FORCEWATCH_*`.
pub fn placeholders(request: &ActionRequest) -> Vec<(&'static str, String)> {
    let files: Vec<String> = request
        .files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    vec![
        ("kind", request.kind.as_str().to_string()),
        ("policy", request.policy.clone()),
        ("issue", request.issue.to_string()),
        ("step", request.step.map(|s| s.to_string()).unwrap_or_default()),
        (
            "valid",
            request.valid.as_ref().map(valid_time_stamp).unwrap_or_default(),
        ),
        ("sources", request.sources.join("_")),
        ("files", files.join(" ")),
        ("file", files.first().cloned().unwrap_or_default()),
    ]
}

/// Substitute `{name}` placeholders. Paths are shell-quoted when needed;
/// unknown placeholders are left as they are.
pub fn render(template: &str, request: &ActionRequest) -> String {
    let mut out = template.to_string();
    for (name, value) in placeholders(request) {
        let value = match name {
            "files" => request
                .files
                .iter()
                .map(|p| shell_quote(&p.to_string_lossy()))
                .collect::<Vec<_>>()
                .join(" "),
            "file" => shell_quote(&value),
            _ => value,
        };
        out = out.replace(&format!("{{{name}}}"), &value);
    }
    out
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
