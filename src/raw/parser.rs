use crate::{error::ParseError, sexpr::SExpr};

use super::{Board, Component, Footprint, NetList, Part};

fn expect_root(sexpr: &SExpr, expected: &'static str) -> Result<(), ParseError> {
    match sexpr.label() {
        Some(label) if label == expected => Ok(()),
        found => Err(ParseError::UnexpectedRoot {
            expected,
            found: found.unwrap_or_default().to_owned(),
        }),
    }
}

/// `(fields (field (name N) V) ...)`, a field without a value is empty
fn parse_fields<'a>(sexpr: &SExpr<'a>) -> Result<Vec<(&'a str, &'a str)>, ParseError> {
    let Some(fields) = sexpr.children("fields").next() else {
        return Ok(vec![]);
    };
    fields
        .children("field")
        .map(|field| {
            let name = field.value("name")?;
            let value = field.strings().next().unwrap_or("");
            Ok((name, value))
        })
        .collect()
}

impl<'a, 'b> TryFrom<&'b SExpr<'a>> for Component<'a> {
    type Error = ParseError;

    fn try_from(sexpr: &'b SExpr<'a>) -> Result<Self, Self::Error> {
        let ref_des = sexpr.value("ref")?;
        let value = sexpr.opt_value("value").unwrap_or("");
        let footprint = sexpr.opt_value("footprint");
        let datasheet = sexpr.opt_value("datasheet");
        let libsource = sexpr.children("libsource").next();
        let lib = libsource.and_then(|s| s.opt_value("lib"));
        let part = libsource.and_then(|s| s.opt_value("part"));
        let description = libsource.and_then(|s| s.opt_value("description"));
        let fields = parse_fields(sexpr)?;

        Ok(Component {
            ref_des,
            value,
            footprint,
            datasheet,
            lib,
            part,
            description,
            fields,
        })
    }
}

impl<'a, 'b> TryFrom<&'b SExpr<'a>> for Part<'a> {
    type Error = ParseError;

    fn try_from(sexpr: &'b SExpr<'a>) -> Result<Self, Self::Error> {
        let lib = sexpr.value("lib")?;
        let part = sexpr.value("part")?;
        let description = sexpr.opt_value("description");
        let docs = sexpr.opt_value("docs");
        let fields = parse_fields(sexpr)?;

        Ok(Part {
            part,
            lib,
            description,
            docs,
            fields,
        })
    }
}

impl<'a, 'b> TryFrom<&'b SExpr<'a>> for NetList<'a> {
    type Error = ParseError;

    fn try_from(sexpr: &'b SExpr<'a>) -> Result<Self, Self::Error> {
        expect_root(sexpr, "export")?;

        let components = match sexpr.children("components").next() {
            Some(components) => components
                .children("comp")
                .map(Component::try_from)
                .collect::<Result<_, _>>()?,
            None => vec![],
        };

        let parts = match sexpr.children("libparts").next() {
            Some(parts) => parts
                .children("libpart")
                .map(Part::try_from)
                .collect::<Result<_, _>>()?,
            None => vec![],
        };

        Ok(NetList { components, parts })
    }
}

/// Reference designator of a footprint, from `(fp_text reference R1 ...)`
/// or, since KiCad 8, `(property "Reference" "R1" ...)`
fn footprint_reference<'a>(sexpr: &SExpr<'a>) -> Result<&'a str, ParseError> {
    let labelled = |label: &'static str, key: &'static str| {
        sexpr.children(label).find_map(|child| {
            let mut strings = child.strings();
            (strings.next() == Some(key)).then(|| strings.next()).flatten()
        })
    };
    labelled("fp_text", "reference")
        .or_else(|| labelled("property", "Reference"))
        .ok_or_else(|| ParseError::MissingChild("fp_text reference".to_owned()))
}

impl<'a, 'b> TryFrom<&'b SExpr<'a>> for Footprint<'a> {
    type Error = ParseError;

    fn try_from(sexpr: &'b SExpr<'a>) -> Result<Self, Self::Error> {
        let fpid = sexpr.strings().next().ok_or(ParseError::MissingValue())?;
        let reference = footprint_reference(sexpr)?;
        let layer = sexpr.value("layer")?;

        let mut at = sexpr.child("at")?.strings();
        let x = at.next().ok_or(ParseError::MissingValue())?;
        let y = at.next().ok_or(ParseError::MissingValue())?;
        let rotation = at.next();

        let attrs = sexpr
            .children("attr")
            .flat_map(|attr| attr.strings())
            .collect();

        Ok(Footprint {
            fpid,
            reference,
            layer,
            x,
            y,
            rotation,
            attrs,
        })
    }
}

impl<'a, 'b> TryFrom<&'b SExpr<'a>> for Board<'a> {
    type Error = ParseError;

    fn try_from(sexpr: &'b SExpr<'a>) -> Result<Self, Self::Error> {
        expect_root(sexpr, "kicad_pcb")?;

        let footprints = sexpr
            .items()
            .iter()
            .filter(|child| matches!(child.label(), Some("module") | Some("footprint")))
            .map(Footprint::try_from)
            .collect::<Result<_, _>>()?;

        Ok(Board { footprints })
    }
}
