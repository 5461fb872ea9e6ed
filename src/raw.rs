mod parser;

/// The full netlist
#[derive(Debug, Clone)]
pub struct NetList<'a> {
    pub components: Vec<Component<'a>>,
    pub parts: Vec<Part<'a>>,
}

/// A component in the schematic
#[derive(Debug, Clone)]
pub struct Component<'a> {
    pub ref_des: &'a str,
    pub value: &'a str,
    pub footprint: Option<&'a str>,
    pub datasheet: Option<&'a str>,
    pub lib: Option<&'a str>,
    pub part: Option<&'a str>,
    pub description: Option<&'a str>,
    pub fields: Vec<(&'a str, &'a str)>,
}

/// A library part
#[derive(Debug, Clone)]
pub struct Part<'a> {
    pub part: &'a str,
    pub lib: &'a str,
    pub description: Option<&'a str>,
    pub docs: Option<&'a str>,
    pub fields: Vec<(&'a str, &'a str)>,
}

/// The footprints of a board
#[derive(Debug, Clone)]
pub struct Board<'a> {
    pub footprints: Vec<Footprint<'a>>,
}

/// A placed footprint, numbers still as written in the file
#[derive(Debug, Clone)]
pub struct Footprint<'a> {
    pub fpid: &'a str,
    pub reference: &'a str,
    pub layer: &'a str,
    pub x: &'a str,
    pub y: &'a str,
    pub rotation: Option<&'a str>,
    pub attrs: Vec<&'a str>,
}
