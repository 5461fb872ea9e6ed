//! Merge a KiCad netlist and board into one BOM + XYRS table.
//!
//! Components come from the netlist export (`.net`) and carry the
//! manufacturer fields; placements come from the board (`.kicad_pcb`) and
//! carry position, rotation and side. [`merge::Bom`] joins the two on the
//! reference designator, [`output::write_csv`] emits the result.

use std::collections::BTreeSet;
use std::fmt::Display;

pub mod config;
pub mod error;
pub mod merge;
pub mod output;
mod parse;
pub mod raw;
pub mod sexpr;

pub use config::{MergeConfig, PruneRules};
pub use error::{Error, ParseError};
pub use merge::{Bom, Merger, Record, Warning};

use sexpr::SExpr;

/// Board length unit per millimetre (nanometres)
pub const NM_PER_MM: f64 = 1_000_000.0;
/// Board angle unit per degree (tenths of a degree)
pub const DECIDEGREES_PER_DEGREE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefDes<'a>(pub &'a str);

impl<'a> Display for RefDes<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartId<'a> {
    pub lib: &'a str,
    pub part: &'a str,
}

/// The components and library parts of a netlist
#[derive(Debug, Clone)]
pub struct NetList<'a> {
    pub components: Vec<Component<'a>>,
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone)]
pub struct Component<'a> {
    pub ref_des: RefDes<'a>,
    pub value: &'a str,
    pub part_id: Option<PartId<'a>>,
    pub footprint: Option<&'a str>,
    pub datasheet: Option<&'a str>,
    pub description: Option<&'a str>,
    pub fields: Vec<(&'a str, &'a str)>,
}

#[derive(Debug, Clone)]
pub struct Part<'a> {
    pub part_id: PartId<'a>,
    pub description: Option<&'a str>,
    pub docs: Option<&'a str>,
    pub fields: Vec<(&'a str, &'a str)>,
}

fn lookup<'a>(fields: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, value)| *value)
        .filter(|value| !value.is_empty())
}

impl<'a> Component<'a> {
    /// The component's own value for `name`, ignoring the library part
    pub fn own_field(&self, name: &str) -> Option<&'a str> {
        lookup(&self.fields, name)
    }
}

impl<'a> Part<'a> {
    pub fn field(&self, name: &str) -> Option<&'a str> {
        lookup(&self.fields, name)
    }
}

impl<'a> NetList<'a> {
    /// Parse a netlist export, `(export ...)`
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let sexpr = SExpr::try_from(input)?;
        let raw = raw::NetList::try_from(&sexpr)?;
        raw.try_into()
    }

    pub fn part(&self, component: &Component<'a>) -> Option<&Part<'a>> {
        let part_id = component.part_id?;
        self.parts.iter().find(|part| part.part_id == part_id)
    }

    /// Field value of a component, falling back to its library part
    pub fn field(&self, component: &Component<'a>, name: &str) -> &'a str {
        component
            .own_field(name)
            .or_else(|| self.part(component)?.field(name))
            .unwrap_or("")
    }

    pub fn datasheet(&self, component: &Component<'a>) -> &'a str {
        component
            .datasheet
            .filter(|s| !s.is_empty())
            .or_else(|| self.part(component)?.docs)
            .unwrap_or("")
    }

    pub fn description(&self, component: &Component<'a>) -> &'a str {
        let part = self.part(component);
        component
            .own_field("Description")
            .or_else(|| part?.field("Description"))
            .or(component.description)
            .or_else(|| part?.description)
            .unwrap_or("")
    }

    /// Every field name used by any component
    pub fn component_field_union(&self) -> BTreeSet<&'a str> {
        self.components
            .iter()
            .flat_map(|comp| comp.fields.iter().map(|(name, _)| *name))
            .collect()
    }

    /// Every field name declared by any library part
    pub fn part_field_union(&self) -> BTreeSet<&'a str> {
        self.parts
            .iter()
            .flat_map(|part| part.fields.iter().map(|(name, _)| *name))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Top,
    Bottom,
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Top => f.write_str("top"),
            Side::Bottom => f.write_str("bottom"),
        }
    }
}

/// Placement class of a footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FootprintAttribute {
    /// Through-hole or unspecified
    #[default]
    Default,
    /// Normal part inserted by the pick-and-place machine
    Smd,
    /// Exists on the board only, nothing to place
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpId<'a> {
    pub lib: &'a str,
    pub name: &'a str,
}

impl<'a> Display for FpId<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.lib, self.name)
    }
}

/// A board position in nanometres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone)]
pub struct Footprint<'a> {
    pub ref_des: RefDes<'a>,
    pub fpid: FpId<'a>,
    pub center: Point,
    /// Tenths of a degree
    pub orientation: f64,
    pub flipped: bool,
    pub attribute: FootprintAttribute,
}

impl<'a> Footprint<'a> {
    pub fn side(&self) -> Side {
        if self.flipped {
            Side::Bottom
        } else {
            Side::Top
        }
    }
}

/// The placed footprints of a board
#[derive(Debug, Clone)]
pub struct Board<'a> {
    pub footprints: Vec<Footprint<'a>>,
}

impl<'a> Board<'a> {
    /// Parse a board file, `(kicad_pcb ...)`
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let sexpr = SExpr::try_from(input)?;
        let raw = raw::Board::try_from(&sexpr)?;
        raw.try_into()
    }
}
