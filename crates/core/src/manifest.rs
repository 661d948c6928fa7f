//! Display-order manifest stored alongside the saved designs.
//!
//! The file is plain text: a header line followed by one indented
//! `uuid = "<uuid>"` line per design, in display order.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DesignError, Result};

/// File name of the manifest inside the saved designs directory.
pub const MANIFEST_FILE: &str = "ShipDesignOrdering.manifest";

/// First line of every manifest.
pub const MANIFEST_HEADER: &str = "ShipDesignOrdering";

static UUID_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*uuid\s*=\s*"([^"]*)"\s*$"#).expect("invalid manifest line regex")
});

/// Ordered list of saved design UUIDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesignManifest {
    /// UUIDs in display order.
    pub order: Vec<Uuid>,
}

impl DesignManifest {
    /// Wrap an existing order.
    pub fn new(order: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            order: order.into_iter().collect(),
        }
    }

    /// Parse manifest text, skipping lines that do not hold a valid UUID.
    pub fn parse(contents: &str) -> Self {
        let mut lines = contents.lines().filter(|line| !line.trim().is_empty());
        let mut order = Vec::new();

        match lines.next() {
            Some(first) if first.trim() == MANIFEST_HEADER => {}
            Some(first) => {
                warn!("design manifest is missing its header");
                if let Some(uuid) = parse_line(first) {
                    order.push(uuid);
                }
            }
            None => return Self::default(),
        }

        order.extend(lines.filter_map(parse_line));
        Self { order }
    }

    /// Render the manifest text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(MANIFEST_HEADER.len() + 1 + self.order.len() * 48);
        out.push_str(MANIFEST_HEADER);
        out.push('\n');
        for uuid in &self.order {
            let _ = writeln!(out, "    uuid = \"{uuid}\"");
        }
        out
    }

    /// Load the manifest from `path`, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|err| DesignError::io(path, err))?;
        Ok(Some(Self::parse(&contents)))
    }

    /// Write the manifest to `path`, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| DesignError::io(parent, err))?;
        }
        fs::write(path, self.render()).map_err(|err| DesignError::io(path, err))
    }
}

fn parse_line(line: &str) -> Option<Uuid> {
    let Some(caps) = UUID_LINE_RE.captures(line) else {
        warn!(line = line.trim(), "skipping unrecognised design manifest line");
        return None;
    };
    let raw = caps.get(1)?.as_str();
    match Uuid::parse_str(raw) {
        Ok(uuid) => Some(uuid),
        Err(err) => {
            warn!(raw, "skipping invalid UUID in design manifest: {err}");
            None
        }
    }
}

/// Helper to compute the manifest path inside a saved designs directory.
pub fn manifest_path(designs_dir: impl AsRef<Path>) -> PathBuf {
    designs_dir.as_ref().join(MANIFEST_FILE)
}
