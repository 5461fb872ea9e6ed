use crate::{
    raw, Board, Component, FootprintAttribute, Footprint, FpId, NetList, ParseError, Part, PartId,
    Point, RefDes, DECIDEGREES_PER_DEGREE, NM_PER_MM,
};

fn parse_number(s: &str) -> Result<f64, ParseError> {
    s.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(s.to_owned()))
}

/// Millimetres as written in the board file to nanometres
fn parse_mm(s: &str) -> Result<i64, ParseError> {
    Ok((parse_number(s)? * NM_PER_MM).round() as i64)
}

/// Degrees as written in the board file to tenths of a degree
fn parse_degrees(s: &str) -> Result<f64, ParseError> {
    Ok(parse_number(s)? * DECIDEGREES_PER_DEGREE)
}

impl<'a> From<&[&'a str]> for FootprintAttribute {
    fn from(attrs: &[&'a str]) -> Self {
        if attrs.iter().any(|a| matches!(*a, "virtual" | "board_only")) {
            Self::Virtual
        } else if attrs.contains(&"smd") {
            Self::Smd
        } else {
            Self::Default
        }
    }
}

impl<'a> From<&'a str> for FpId<'a> {
    fn from(value: &'a str) -> Self {
        match value.split_once(':') {
            Some((lib, name)) => FpId { lib, name },
            None => FpId { lib: "", name: value },
        }
    }
}

impl<'a> TryFrom<raw::Footprint<'a>> for Footprint<'a> {
    type Error = ParseError;

    fn try_from(value: raw::Footprint<'a>) -> Result<Self, Self::Error> {
        let raw::Footprint {
            fpid,
            reference,
            layer,
            x,
            y,
            rotation,
            attrs,
        } = value;
        let center = Point {
            x: parse_mm(x)?,
            y: parse_mm(y)?,
        };
        let orientation = rotation.map(parse_degrees).transpose()?.unwrap_or(0.0);

        Ok(Footprint {
            ref_des: RefDes(reference),
            fpid: fpid.into(),
            center,
            orientation,
            flipped: layer == "B.Cu",
            attribute: attrs.as_slice().into(),
        })
    }
}

impl<'a> TryFrom<raw::Board<'a>> for Board<'a> {
    type Error = ParseError;

    fn try_from(value: raw::Board<'a>) -> Result<Self, Self::Error> {
        let footprints = value
            .footprints
            .into_iter()
            .map(|fp| fp.try_into())
            .collect::<Result<_, _>>()?;
        Ok(Board { footprints })
    }
}

impl<'a> From<raw::Part<'a>> for Part<'a> {
    fn from(value: raw::Part<'a>) -> Self {
        let raw::Part {
            part,
            lib,
            description,
            docs,
            fields,
        } = value;
        Part {
            part_id: PartId { lib, part },
            description,
            docs,
            fields,
        }
    }
}

impl<'a> From<raw::Component<'a>> for Component<'a> {
    fn from(value: raw::Component<'a>) -> Self {
        let raw::Component {
            ref_des,
            value,
            footprint,
            datasheet,
            lib,
            part,
            description,
            fields,
        } = value;
        let part_id = lib.zip(part).map(|(lib, part)| PartId { lib, part });

        Component {
            ref_des: RefDes(ref_des),
            value,
            part_id,
            footprint,
            datasheet,
            description,
            fields,
        }
    }
}

impl<'a> TryFrom<raw::NetList<'a>> for NetList<'a> {
    type Error = ParseError;

    fn try_from(value: raw::NetList<'a>) -> Result<Self, Self::Error> {
        let raw::NetList { components, parts } = value;

        let components = components.into_iter().map(Component::from).collect();
        let parts = parts.into_iter().map(Part::from).collect();

        Ok(NetList { components, parts })
    }
}
