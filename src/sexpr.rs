use std::{borrow::Cow, fmt::Display};

use crate::error::ParseError;

mod lexer;
mod parser;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SExpr<'a> {
    SExpr(&'a str, Box<[SExpr<'a>]>),
    String(&'a str),
}

impl<'a> Display for SExpr<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::SExpr(label, children) => {
                write!(f, "({}", label)?;
                for child in children.iter() {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
            SExpr::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl<'a> SExpr<'a> {
    /// Label of a list node, `None` for a bare string
    pub fn label(&self) -> Option<&'a str> {
        match self {
            SExpr::SExpr(label, _) => Some(label),
            SExpr::String(_) => None,
        }
    }

    /// Direct children of a list node, empty for a bare string
    pub fn items(&self) -> &[SExpr<'a>] {
        match self {
            SExpr::SExpr(_, children) => &children[..],
            SExpr::String(_) => &[],
        }
    }

    /// First string child of the child labelled `label`
    pub fn value(&self, label: &str) -> Result<&'a str, ParseError> {
        let child = self.child(label)?;
        child.strings().next().ok_or(ParseError::MissingValue())
    }

    /// Like [`SExpr::value`], but a missing child or value is `None`
    pub fn opt_value(&self, label: &str) -> Option<&'a str> {
        self.children(label).next()?.strings().next()
    }

    /// All direct string children, in order
    pub fn strings<'b>(&'b self) -> impl Iterator<Item = &'a str> + 'b {
        self.items().iter().filter_map(|child| match child {
            SExpr::String(s) => Some(*s),
            SExpr::SExpr(_, _) => None,
        })
    }

    pub fn children<'b, 'c>(&'b self, label: &'c str) -> LabeledChildIterator<'a, 'b, 'c> {
        let iter = match self {
            SExpr::String(_) => None,
            SExpr::SExpr(_, children) => Some(children.iter()),
        };
        LabeledChildIterator { iter, label }
    }

    pub fn child<'b>(&self, label: &'b str) -> Result<&SExpr<'a>, ParseError> {
        let mut iter = self.children(label);
        iter.next()
            .ok_or(ParseError::MissingChild(label.to_owned()))
    }
}

#[derive(Debug)]
pub struct LabeledChildIterator<'a, 'b, 'c> {
    iter: Option<std::slice::Iter<'b, SExpr<'a>>>,
    label: &'c str,
}

impl<'a, 'b, 'c> Iterator for LabeledChildIterator<'a, 'b, 'c> {
    type Item = &'b SExpr<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let iter = self.iter.as_mut()?;
        loop {
            let item = iter.next();
            match &item {
                None => return None,
                Some(SExpr::String(_)) => continue,
                Some(SExpr::SExpr(label, _)) => {
                    if *label == self.label {
                        return item;
                    }
                }
            }
        }
    }
}

impl<'a> TryFrom<&'a String> for SExpr<'a> {
    type Error = ParseError;

    fn try_from(input: &'a String) -> Result<Self, Self::Error> {
        SExpr::try_from(input.as_str())
    }
}

/// Resolve backslash escapes left in a quoted string.
///
/// The tree borrows quoted strings verbatim, so this only allocates when an
/// escape is actually present.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}
