use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use serde::Serialize;

use crate::error::Result;
use crate::identifier;

pub const DETAIL_UNKNOWN: &str = "unknown";
pub const DRIVER_NONE: &str = "none";

/// One logical entry of a `.list` file, merged from the `key=status`,
/// `key.info=detail` and `key.kext=driver` lines of the same base key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SupportRecord {
    pub key: String,
    pub status: Option<String>,
    pub detail: String,
    pub driver: String,
}

/// In-memory support database. Keys are upper-cased; base keys keep their
/// first-seen order so a load -> mutate -> serialize round trip preserves the
/// file's layout.
#[derive(Clone, Debug, Default)]
pub struct SupportDatabase {
    order: Vec<String>,
    status: HashMap<String, String>,
    detail: HashMap<String, String>,
    driver: HashMap<String, String>,
}

impl SupportDatabase {
    pub fn from_text(content: &str) -> Self {
        let mut db = Self::default();
        db.extend_from_text(content);
        db
    }

    /// Lenient loader: blank lines, `#` comments and lines without `=` are
    /// skipped. Strictness lives in `validate`, not here.
    pub fn extend_from_text(&mut self, content: &str) {
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::debug!("Skipping line without separator: {}", line);
                continue;
            };
            let key = key.trim();
            let value = value.trim().to_string();
            if let Some(base) = key.strip_suffix(".info") {
                let base = self.touch(base);
                self.detail.insert(base, value);
            } else if let Some(base) = key.strip_suffix(".kext") {
                let base = self.touch(base);
                self.driver.insert(base, value);
            } else {
                let base = self.touch(key);
                self.status.insert(base, value);
            }
        }
    }

    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&content))
    }

    pub fn save_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.serialize())?;
        Ok(())
    }

    fn touch(&mut self, base: &str) -> String {
        let up = base.to_uppercase();
        if !self.contains(&up) {
            self.order.push(up.clone());
        }
        up
    }

    fn contains(&self, up: &str) -> bool {
        self.status.contains_key(up) || self.detail.contains_key(up) || self.driver.contains_key(up)
    }

    pub fn lookup_exact(&self, key: &str) -> Option<SupportRecord> {
        let up = key.trim().to_uppercase();
        if !self.contains(&up) {
            return None;
        }
        Some(SupportRecord {
            status: self.status.get(&up).cloned(),
            detail: self.detail.get(&up).cloned().unwrap_or_else(|| DETAIL_UNKNOWN.to_string()),
            driver: self.driver.get(&up).cloned().unwrap_or_else(|| DRIVER_NONE.to_string()),
            key: up,
        })
    }

    /// Raw stored status for a key, if a `key=status` line existed. A record
    /// known only through `.info`/`.kext` lines reports `None` here.
    pub fn status_of(&self, key: &str) -> Option<&str> {
        self.status.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Base keys in insertion order. The resolver's name tiers rely on this
    /// order as the tie-break among substring candidates.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn insert_record(&mut self, key: &str, status: Option<&str>, detail: Option<&str>, driver: Option<&str>) {
        let up = self.touch(key.trim());
        if let Some(s) = status {
            self.status.insert(up.clone(), s.to_string());
        }
        if let Some(d) = detail {
            self.detail.insert(up.clone(), d.to_string());
        }
        if let Some(k) = driver {
            self.driver.insert(up, k.to_string());
        }
    }

    pub fn remove_record(&mut self, key: &str) -> bool {
        let up = key.trim().to_uppercase();
        if !self.contains(&up) {
            return false;
        }
        self.status.remove(&up);
        self.detail.remove(&up);
        self.driver.remove(&up);
        self.order.retain(|k| k != &up);
        true
    }

    /// Deterministic re-emission: per base key in insertion order, the status
    /// line, then `.info`, then `.kext`, each only when present.
    pub fn serialize(&self) -> String {
        let mut lines = Vec::new();
        for key in &self.order {
            if let Some(s) = self.status.get(key) {
                lines.push(format!("{}={}", key, s));
            }
            if let Some(d) = self.detail.get(key) {
                lines.push(format!("{}.info={}", key, d));
            }
            if let Some(k) = self.driver.get(key) {
                lines.push(format!("{}.kext={}", key, k));
            }
        }
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingSeparator,
    InvalidKeyShape,
    EmptyStatusValue,
    InvalidStatusValue,
}

impl ViolationKind {
    /// Repair policy is deletion of the offending line. An empty status value
    /// is reported but left for the user to fill in.
    pub fn repairable(self) -> bool {
        !matches!(self, ViolationKind::EmptyStatusValue)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FormatViolation {
    pub line_no: usize,
    pub kind: ViolationKind,
    pub line: String,
}

impl FormatViolation {
    pub fn message(&self) -> String {
        match self.kind {
            ViolationKind::MissingSeparator => "missing '=' separator".to_string(),
            ViolationKind::InvalidKeyShape => {
                let key = self.line.split('=').next().unwrap_or("").trim();
                format!("invalid device ID format: {}", key)
            }
            ViolationKind::EmptyStatusValue => "status value must not be empty".to_string(),
            ViolationKind::InvalidStatusValue => "status value must be 0 or 1".to_string(),
        }
    }
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} - {}", self.line_no, self.message(), self.line)
    }
}

/// Strict re-parse of ID-keyed `.list` content. Unlike the lenient loader,
/// nothing is skipped silently: every non-blank, non-comment line must carry
/// `=`, a plain key must have the `VVVV&DDDD` shape, and a status value must
/// be exactly `0` or `1`. Line numbers are 1-based.
pub fn validate(content: &str) -> Vec<FormatViolation> {
    let mut out = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let violation = |kind| FormatViolation { line_no, kind, line: line.to_string() };
        let Some((key, value)) = line.split_once('=') else {
            out.push(violation(ViolationKind::MissingSeparator));
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.ends_with(".info") || key.ends_with(".kext") {
            continue;
        }
        if !identifier::is_valid_text(key) {
            out.push(violation(ViolationKind::InvalidKeyShape));
            continue;
        }
        if value.is_empty() {
            out.push(violation(ViolationKind::EmptyStatusValue));
        } else if value != "0" && value != "1" {
            out.push(violation(ViolationKind::InvalidStatusValue));
        }
    }
    out
}

/// Deletes every repairable line and returns the rewritten content along with
/// the number of removed lines. No content-level correction is attempted.
pub fn repair(content: &str) -> (String, usize) {
    let drop: HashSet<usize> = validate(content)
        .iter()
        .filter(|v| v.kind.repairable())
        .map(|v| v.line_no)
        .collect();
    if drop.is_empty() {
        return (content.to_string(), 0);
    }
    let kept: Vec<&str> = content
        .lines()
        .enumerate()
        .filter(|(i, _)| !drop.contains(&(i + 1)))
        .map(|(_, l)| l)
        .collect();
    let mut out = kept.join("\n");
    if !out.is_empty() && content.ends_with('\n') {
        out.push('\n');
    }
    (out, drop.len())
}
