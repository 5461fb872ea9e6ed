//! Join netlist components with board placements.
//!
//! A [`Merger`] runs three stages over one [`Bom`]:
//!
//! 1. [`Merger::load_components`] builds one [`Record`] per netlist
//!    component, keyed by reference;
//! 2. [`Merger::place`] adds position, rotation, side and the placed
//!    footprint from the board;
//! 3. [`Merger::prune`] removes not fitted parts and the references and
//!    footprints matched by the [`PruneRules`](crate::PruneRules).
//!
//! Anything suspicious along the way is logged and kept as a [`Warning`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::{
    config::{MergeConfig, Prune},
    error::Error,
    output::format_decimal,
    sexpr::unescape,
    Board, NetList, DECIDEGREES_PER_DEGREE, NM_PER_MM,
};

pub const REFERENCE: &str = "Reference";
pub const VALUE: &str = "Value";
pub const DESCRIPTION: &str = "Description";
pub const DATASHEET: &str = "Datasheet";
pub const CONFIG: &str = "Config";
pub const FOOTPRINT: &str = "Footprint";
pub const POS_X: &str = "PosX";
pub const POS_Y: &str = "PosY";
pub const ROTATION: &str = "Rotation";
pub const SIDE: &str = "Side";

/// Columns that always come first, in this order
const PINNED: [&str; 3] = [REFERENCE, VALUE, DESCRIPTION];
/// Fields filled from dedicated component accessors instead of by name
const FIXED: [&str; 5] = [REFERENCE, VALUE, DATASHEET, DESCRIPTION, CONFIG];

/// Pinned columns followed by every other field name, sorted
pub fn column_set<'a>(
    component_fields: &BTreeSet<&'a str>,
    part_fields: &BTreeSet<&'a str>,
) -> Vec<&'a str> {
    let rest = component_fields
        .union(part_fields)
        .copied()
        .filter(|name| !PINNED.contains(name));
    PINNED.into_iter().chain(rest).collect()
}

/// One BOM line, field name to text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Set a field, returning the previous value
    pub fn insert(&mut self, field: &str, value: impl Into<String>) -> Option<String> {
        self.fields.insert(field.to_owned(), value.into())
    }
}

/// A recoverable problem found while merging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two netlist components share a reference, the later one was kept
    DuplicateReference { reference: String },
    /// A placed footprint has no netlist component and was skipped
    UnmatchedPlacement { reference: String },
    /// The board changed a field the netlist already set
    FieldOverride {
        reference: String,
        field: String,
        old: String,
        new: String,
    },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::DuplicateReference { reference } => {
                write!(f, "Netlist repeats \"{reference}\", keeping the last one")
            }
            Warning::UnmatchedPlacement { reference } => {
                write!(f, "PCB skipping \"{reference}\", not in the netlist")
            }
            Warning::FieldOverride {
                reference,
                field,
                old,
                new,
            } => write!(f, "PCB overriding {reference} {field}, \"{old}\" != \"{new}\""),
        }
    }
}

/// Decidegrees back to degrees, rounded to 1e-9 so the angle reads as
/// written in the board file
fn degrees(decidegrees: f64) -> f64 {
    (decidegrees / DECIDEGREES_PER_DEGREE * 1e9).round() / 1e9
}

fn push_warning(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{warning}");
    warnings.push(warning);
}

/// The records of one run, keyed and ordered by reference
#[derive(Debug, Clone, Default)]
pub struct Bom {
    records: BTreeMap<String, Record>,
    warnings: Vec<Warning>,
}

impl Bom {
    pub fn get(&self, reference: &str) -> Option<&Record> {
        self.records.get(reference)
    }

    /// Records in lexicographic reference order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Merger {
    config: MergeConfig,
    prune: Prune,
}

impl Merger {
    /// Fails when a prune pattern is not a valid regular expression
    pub fn new(config: MergeConfig) -> Result<Self, Error> {
        let prune = config.prune.compile()?;
        Ok(Self { config, prune })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Load, place and prune in one go
    pub fn merge(&self, netlist: &NetList, board: &Board) -> Bom {
        let mut bom = self.load_components(netlist);
        self.place(&mut bom, board);
        self.prune(&mut bom);
        bom
    }

    pub fn load_components(&self, netlist: &NetList) -> Bom {
        let component_fields = netlist.component_field_union();
        let part_fields = netlist.part_field_union();
        info!("Component fields: {component_fields:?}");
        info!("Library part fields: {part_fields:?}");

        let columns = column_set(&component_fields, &part_fields);
        let extra: Vec<&str> = columns
            .into_iter()
            .filter(|name| !FIXED.contains(name))
            .collect();

        let mut bom = Bom::default();
        for comp in &netlist.components {
            let reference = unescape(comp.ref_des.0);
            let value = unescape(comp.value);
            // Power and flag symbols
            if reference.starts_with('#') {
                continue;
            }
            if self.prune.value(&value) {
                debug!("Excluding {reference} by value \"{value}\"");
                continue;
            }

            let mut record = Record::default();
            record.insert(REFERENCE, &*reference);
            record.insert(VALUE, value);
            record.insert(DATASHEET, unescape(netlist.datasheet(comp)));
            record.insert(DESCRIPTION, unescape(netlist.description(comp)));
            record.insert(CONFIG, unescape(netlist.field(comp, CONFIG)));
            for name in &extra {
                record.insert(name, unescape(netlist.field(comp, name)));
            }
            // Library footprints are often blank or stale, the schematic
            // symbol's own assignment is the one that counts
            record.insert(FOOTPRINT, unescape(comp.footprint.unwrap_or("")));

            let reference = reference.into_owned();
            if bom.records.insert(reference.clone(), record).is_some() {
                push_warning(
                    &mut bom.warnings,
                    Warning::DuplicateReference { reference },
                );
            }
        }
        bom
    }

    pub fn place(&self, bom: &mut Bom, board: &Board) {
        let Bom { records, warnings } = bom;

        for fp in &board.footprints {
            let reference = unescape(fp.ref_des.0);
            if fp.attribute != self.config.placeable {
                debug!("Not placing {reference}, attribute {:?}", fp.attribute);
                continue;
            }
            let Some(record) = records.get_mut(&*reference) else {
                push_warning(
                    warnings,
                    Warning::UnmatchedPlacement {
                        reference: reference.into_owned(),
                    },
                );
                continue;
            };

            let placement = [
                (REFERENCE, reference.to_string()),
                (POS_X, format_decimal(fp.center.x as f64 / NM_PER_MM)),
                (POS_Y, format_decimal(fp.center.y as f64 / NM_PER_MM)),
                (ROTATION, format_decimal(degrees(fp.orientation))),
                (SIDE, fp.side().to_string()),
                (FOOTPRINT, unescape(&fp.fpid.to_string()).into_owned()),
            ];
            for (field, new) in placement {
                match record.insert(field, new.clone()) {
                    Some(old) if old != new => push_warning(
                        warnings,
                        Warning::FieldOverride {
                            reference: reference.to_string(),
                            field: field.to_owned(),
                            old,
                            new,
                        },
                    ),
                    _ => {}
                }
            }
        }
    }

    pub fn prune(&self, bom: &mut Bom) {
        let marker = self.config.dnf_marker.as_str();
        bom.records.retain(|reference, record| {
            if !marker.is_empty() && record.get(CONFIG).is_some_and(|c| c.contains(marker)) {
                debug!("Pruning {reference}, not fitted");
                return false;
            }
            if self.prune.reference(reference) {
                debug!("Pruning {reference} by reference");
                return false;
            }
            if record.get(FOOTPRINT).is_some_and(|fp| self.prune.footprint(fp)) {
                debug!("Pruning {reference} by footprint");
                return false;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Component, FootprintAttribute, Footprint, FpId, PartId, Point, PruneRules, RefDes,
    };
    use rstest::*;

    fn component<'a>(
        ref_des: &'a str,
        value: &'a str,
        fields: Vec<(&'a str, &'a str)>,
    ) -> Component<'a> {
        Component {
            ref_des: RefDes(ref_des),
            value,
            part_id: Some(PartId {
                lib: "Device",
                part: "R",
            }),
            footprint: Some("Resistor_SMD:R_0603"),
            datasheet: Some("https://example.com/r.pdf"),
            description: Some("Resistor"),
            fields,
        }
    }

    fn footprint<'a>(ref_des: &'a str, fpid: &'a str) -> Footprint<'a> {
        let (lib, name) = fpid.split_once(':').unwrap();
        Footprint {
            ref_des: RefDes(ref_des),
            fpid: FpId { lib, name },
            center: Point {
                x: 1_500_000,
                y: 2_500_000,
            },
            orientation: 900.0,
            flipped: false,
            attribute: FootprintAttribute::Smd,
        }
    }

    fn netlist<'a>(components: Vec<Component<'a>>) -> NetList<'a> {
        NetList {
            components,
            parts: vec![],
        }
    }

    fn board<'a>(footprints: Vec<Footprint<'a>>) -> Board<'a> {
        Board { footprints }
    }

    fn merger() -> Merger {
        Merger::new(MergeConfig::default()).unwrap()
    }

    #[test]
    fn placement_fills_xyrs() {
        let netlist = netlist(vec![component("R1", "10k", vec![("Config", "")])]);
        let board = board(vec![footprint("R1", "Resistor_SMD:R_0603")]);

        let bom = merger().merge(&netlist, &board);
        let r1 = bom.get("R1").unwrap();

        assert_eq!(r1.get(REFERENCE), Some("R1"));
        assert_eq!(r1.get(VALUE), Some("10k"));
        assert_eq!(r1.get(DESCRIPTION), Some("Resistor"));
        assert_eq!(r1.get(DATASHEET), Some("https://example.com/r.pdf"));
        assert_eq!(r1.get(POS_X), Some("1.5"));
        assert_eq!(r1.get(POS_Y), Some("2.5"));
        assert_eq!(r1.get(ROTATION), Some("90.0"));
        assert_eq!(r1.get(SIDE), Some("top"));
        assert!(bom.warnings().is_empty());
    }

    #[rstest]
    #[case("0", "0.0")]
    #[case("90", "90.0")]
    #[case("0.11", "0.11")]
    #[case("-255.98", "-255.98")]
    #[case("359.99", "359.99")]
    fn rotation_reads_back_as_written(#[case] rotation: &str, #[case] expected: &str) {
        let text = format!(
            r#"(kicad_pcb (footprint "Resistor_SMD:R_0603" (layer "F.Cu") (at 1 2 {rotation})
                (property "Reference" "R1") (attr smd)))"#
        );
        let board = Board::parse(&text).unwrap();
        let netlist = netlist(vec![component("R1", "10k", vec![])]);

        let bom = merger().merge(&netlist, &board);
        assert_eq!(bom.get("R1").unwrap().get(ROTATION), Some(expected));
    }

    #[test]
    fn flipped_footprint_is_bottom() {
        let netlist = netlist(vec![component("U1", "MCU", vec![])]);
        let mut fp = footprint("U1", "Resistor_SMD:R_0603");
        fp.flipped = true;
        fp.orientation = -450.0;

        let bom = merger().merge(&netlist, &board(vec![fp]));
        let u1 = bom.get("U1").unwrap();
        assert_eq!(u1.get(SIDE), Some("bottom"));
        assert_eq!(u1.get(ROTATION), Some("-45.0"));
    }

    #[test]
    fn unmatched_placement_warns_once() {
        let netlist = netlist(vec![component("R1", "10k", vec![])]);
        let board = board(vec![
            footprint("R1", "Resistor_SMD:R_0603"),
            footprint("TP3", "TestPoint:TestPoint_Pad_D1.0mm"),
        ]);

        let bom = merger().merge(&netlist, &board);

        assert!(bom.get("TP3").is_none());
        assert_eq!(
            bom.warnings(),
            &[Warning::UnmatchedPlacement {
                reference: "TP3".to_owned()
            }]
        );
        assert!(bom.warnings()[0].to_string().contains("TP3"));
    }

    #[test]
    fn placed_footprint_wins_with_warning() {
        let netlist = netlist(vec![component("R1", "10k", vec![])]);
        let board = board(vec![footprint("R1", "Resistor_SMD:R_0805")]);

        let bom = merger().merge(&netlist, &board);

        assert_eq!(
            bom.get("R1").unwrap().get(FOOTPRINT),
            Some("Resistor_SMD:R_0805")
        );
        assert_eq!(
            bom.warnings(),
            &[Warning::FieldOverride {
                reference: "R1".to_owned(),
                field: FOOTPRINT.to_owned(),
                old: "Resistor_SMD:R_0603".to_owned(),
                new: "Resistor_SMD:R_0805".to_owned(),
            }]
        );
    }

    #[test]
    fn same_footprint_does_not_warn() {
        let netlist = netlist(vec![component("R1", "10k", vec![])]);
        let board = board(vec![footprint("R1", "Resistor_SMD:R_0603")]);

        let bom = merger().merge(&netlist, &board);
        assert!(bom.warnings().is_empty());
    }

    #[test]
    fn component_field_named_like_placement_is_overridden() {
        let netlist = netlist(vec![component("R1", "10k", vec![("Side", "both")])]);
        let board = board(vec![footprint("R1", "Resistor_SMD:R_0603")]);

        let bom = merger().merge(&netlist, &board);

        assert_eq!(bom.get("R1").unwrap().get(SIDE), Some("top"));
        assert!(matches!(
            &bom.warnings()[..],
            [Warning::FieldOverride { field, old, .. }] if field == SIDE && old == "both"
        ));
    }

    #[rstest]
    #[case(FootprintAttribute::Default)]
    #[case(FootprintAttribute::Virtual)]
    fn only_smd_footprints_are_placed(#[case] attribute: FootprintAttribute) {
        let netlist = netlist(vec![component("J1", "Conn", vec![])]);
        let board = board(
            ["J1", "X9"]
                .into_iter()
                .map(|reference| {
                    let mut fp = footprint(reference, "Connector:Pin");
                    fp.attribute = attribute;
                    fp
                })
                .collect(),
        );

        let bom = merger().merge(&netlist, &board);

        let j1 = bom.get("J1").unwrap();
        assert_eq!(j1.get(POS_X), None);
        assert_eq!(j1.get(SIDE), None);
        // Filtered before the join, so no unmatched warning either
        assert!(bom.warnings().is_empty());
    }

    #[rstest]
    #[case("DNF")]
    #[case("DNF_proto")]
    #[case("rev2 DNF")]
    fn dnf_is_pruned(#[case] config: &str) {
        let netlist = netlist(vec![
            component("R1", "10k", vec![("Config", config)]),
            component("R2", "10k", vec![("Config", "fit")]),
        ]);
        let bom = merger().merge(&netlist, &board(vec![]));

        assert_eq!(bom.references().collect::<Vec<_>>(), vec!["R2"]);
    }

    #[test]
    fn references_and_footprints_are_pruned() {
        let netlist = netlist(vec![
            component("TP1", "TestPoint", vec![]),
            component("MECH1", "Bracket", vec![]),
            component("NT1", "NetTie", vec![]),
            component("R1", "10k", vec![]),
        ]);
        let board = board(vec![
            footprint("TP1", "TestPoint:TestPoint_Pad"),
            footprint("NT1", "NetTie:NetTie-2_SMD_Pad0.5mm"),
        ]);

        let bom = merger().merge(&netlist, &board);

        assert_eq!(bom.references().collect::<Vec<_>>(), vec!["R1"]);
    }

    #[test]
    fn value_exclusions_apply_at_load() {
        let netlist = netlist(vec![
            component("H1", "MOUNTHOLE", vec![]),
            component("R1", "10k", vec![]),
        ]);
        let board = board(vec![footprint("H1", "MountingHole:MountingHole_3.2mm")]);

        let bom = merger().merge(&netlist, &board);

        assert_eq!(bom.references().collect::<Vec<_>>(), vec!["R1"]);
        assert_eq!(
            bom.warnings(),
            &[Warning::UnmatchedPlacement {
                reference: "H1".to_owned()
            }]
        );
    }

    #[test]
    fn power_symbols_are_ignored() {
        let netlist = netlist(vec![
            component("#PWR01", "GND", vec![]),
            component("R1", "10k", vec![]),
        ]);
        let bom = merger().load_components(&netlist);
        assert_eq!(bom.references().collect::<Vec<_>>(), vec!["R1"]);
    }

    #[test]
    fn duplicate_reference_keeps_last_and_warns() {
        let netlist = netlist(vec![
            component("R1", "10k", vec![]),
            component("R1", "22k", vec![]),
        ]);
        let bom = merger().load_components(&netlist);

        assert_eq!(bom.len(), 1);
        assert_eq!(bom.get("R1").unwrap().get(VALUE), Some("22k"));
        assert_eq!(
            bom.warnings(),
            &[Warning::DuplicateReference {
                reference: "R1".to_owned()
            }]
        );
    }

    #[test]
    fn records_are_sorted_lexicographically() {
        let netlist = netlist(vec![
            component("R10", "1k", vec![]),
            component("C1", "100n", vec![]),
            component("R2", "2k", vec![]),
        ]);
        let bom = merger().load_components(&netlist);
        assert_eq!(
            bom.references().collect::<Vec<_>>(),
            vec!["C1", "R10", "R2"]
        );
    }

    #[test]
    fn custom_prune_rules() {
        let config = MergeConfig {
            prune: PruneRules {
                reference: vec!["R.*".to_owned()],
                ..PruneRules::empty()
            },
            dnf_marker: "NOFIT".to_owned(),
            ..MergeConfig::default()
        };
        let netlist = netlist(vec![
            component("R1", "10k", vec![]),
            component("TP1", "TP", vec![]),
            component("C1", "1u", vec![("Config", "NOFIT")]),
            component("C2", "1u", vec![("Config", "DNF")]),
        ]);

        let bom = Merger::new(config).unwrap().merge(&netlist, &board(vec![]));
        assert_eq!(bom.references().collect::<Vec<_>>(), vec!["C2", "TP1"]);
    }

    #[test]
    fn extra_fields_are_loaded() {
        let netlist = netlist(vec![component(
            "R1",
            "10k",
            vec![("MFR", "Yageo"), ("MPN", "RC0603FR-0710KL"), ("Tolerance", "1%")],
        )]);
        let bom = merger().load_components(&netlist);
        let r1 = bom.get("R1").unwrap();

        assert_eq!(r1.get("MFR"), Some("Yageo"));
        assert_eq!(r1.get("MPN"), Some("RC0603FR-0710KL"));
        assert_eq!(r1.get("Tolerance"), Some("1%"));
        assert_eq!(r1.get(CONFIG), Some(""));
    }

    #[test]
    fn column_set_pins_first() {
        let comps: BTreeSet<_> = ["MPN", "Config", "MFR"].into_iter().collect();
        let parts: BTreeSet<_> = ["Reference", "Value", "Footprint", "Datasheet", "Description"]
            .into_iter()
            .collect();
        assert_eq!(
            column_set(&comps, &parts),
            vec![
                "Reference",
                "Value",
                "Description",
                "Config",
                "Datasheet",
                "Footprint",
                "MFR",
                "MPN"
            ]
        );
    }

    #[test]
    fn escaped_strings_are_resolved() {
        let netlist = netlist(vec![component("R1", r#"10k \"precise\""#, vec![])]);
        let bom = merger().load_components(&netlist);
        assert_eq!(
            bom.get("R1").unwrap().get(VALUE),
            Some(r#"10k "precise""#)
        );
    }
}
