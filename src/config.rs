use std::path::{Path, PathBuf};

use regex::Regex;

use crate::{error::Error, FootprintAttribute};

/// Output columns, in order
pub const DEFAULT_COLUMNS: [&str; 11] = [
    "Reference",
    "Value",
    "Description",
    "Footprint",
    "PosX",
    "PosY",
    "Rotation",
    "Side",
    "MFR",
    "MPN",
    "Datasheet",
];

pub const DEFAULT_DNF_MARKER: &str = "DNF";

/// Extension of the board file that sits next to a netlist
pub const BOARD_EXTENSION: &str = "kicad_pcb";

/// Regular expressions removing entries from the BOM.
///
/// Each list is joined into one alternation that must match at the start
/// of the string. An empty list matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneRules {
    /// Applied to the reference of every merged record
    pub reference: Vec<String>,
    /// Applied to the placed footprint of every merged record
    pub footprint: Vec<String>,
    /// Applied to component values while the netlist is loaded
    pub value: Vec<String>,
}

fn owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

impl Default for PruneRules {
    fn default() -> Self {
        Self {
            reference: owned(&["TP.*", "MECH.*"]),
            footprint: owned(&[".*NetTie.*"]),
            value: owned(&["MOUNTHOLE", "SCOPETEST", "MOUNT_HOLE", "SOLDER_BRIDGE.*"]),
        }
    }
}

impl PruneRules {
    pub fn empty() -> Self {
        Self {
            reference: vec![],
            footprint: vec![],
            value: vec![],
        }
    }

    pub fn compile(&self) -> Result<Prune, Error> {
        Ok(Prune {
            reference: combine("reference", &self.reference)?,
            footprint: combine("footprint", &self.footprint)?,
            value: combine("value", &self.value)?,
        })
    }
}

fn combine(field: &'static str, patterns: &[String]) -> Result<Option<Regex>, Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let alternation = patterns
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("^(?:{alternation})"))
        .map(Some)
        .map_err(|source| Error::Pattern { field, source })
}

/// Compiled [`PruneRules`]
#[derive(Debug, Clone)]
pub struct Prune {
    reference: Option<Regex>,
    footprint: Option<Regex>,
    value: Option<Regex>,
}

fn any_match(regex: &Option<Regex>, s: &str) -> bool {
    regex.as_ref().is_some_and(|r| r.is_match(s))
}

impl Prune {
    pub fn reference(&self, reference: &str) -> bool {
        any_match(&self.reference, reference)
    }

    pub fn footprint(&self, footprint: &str) -> bool {
        any_match(&self.footprint, footprint)
    }

    pub fn value(&self, value: &str) -> bool {
        any_match(&self.value, value)
    }
}

/// Everything the merge can be tuned with
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    pub prune: PruneRules,
    /// Records whose `Config` field contains this are not fitted
    pub dnf_marker: String,
    /// Only footprints of this class are placed
    pub placeable: FootprintAttribute,
    pub columns: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            prune: PruneRules::default(),
            dnf_marker: DEFAULT_DNF_MARKER.to_owned(),
            placeable: FootprintAttribute::Smd,
            columns: owned(&DEFAULT_COLUMNS),
        }
    }
}

/// Board path used when none is given: the netlist with a `.kicad_pcb`
/// extension
pub fn default_board_path(netlist: &Path) -> PathBuf {
    netlist.with_extension(BOARD_EXTENSION)
}
