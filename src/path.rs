//! Addressing keys and the resolver that splits them into head and tail.
//!
//! A [`Key`] is either a delimited name (`"a.b.c"`), a position, a slice, or an
//! explicit path of [`Segment`]s (the tuple form `("a", 0, "c")`). Segments of an
//! explicit path are taken literally and never split on the delimiter.

use std::fmt::{self, Display, Formatter};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Settings;
use crate::errors::{TreeError, TreeResult};

static INDEX_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)((?:\[\d+\])*)$").expect("valid index suffix regex"));
static INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").expect("valid index regex"));

/// Slice over a sequence: optional bounds, negative values count from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: Option<isize>,
}

impl SliceSpec {
    #[must_use]
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self {
            start,
            stop,
            step: None,
        }
    }

    /// Everything, `[:]`
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// `[:stop]`
    #[must_use]
    pub fn to(stop: isize) -> Self {
        Self::new(None, Some(stop))
    }

    /// `[start:]`
    #[must_use]
    pub fn starting_at(start: isize) -> Self {
        Self::new(Some(start), None)
    }

    #[must_use]
    pub fn with_step(mut self, step: isize) -> Self {
        self.step = Some(step);
        self
    }

    /// Positions selected in a sequence of length `len`, in selection order.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for a zero step.
    pub fn indices(&self, len: usize) -> TreeResult<Vec<usize>> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(TreeError::InvalidArgument("slice step cannot be zero".to_string()));
        }
        let len = len as isize;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

        let clamp = |bound: Option<isize>, default: isize| match bound {
            None => default,
            Some(b) => {
                let b = if b < 0 { b + len } else { b };
                b.clamp(lower, upper)
            }
        };
        let start = clamp(self.start, if step < 0 { upper } else { lower });
        let stop = clamp(self.stop, if step < 0 { lower } else { upper });

        let mut selected = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            selected.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(selected)
    }
}

impl Display for SliceSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let show = |b: Option<isize>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", show(self.start), show(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

impl From<Range<isize>> for SliceSpec {
    fn from(r: Range<isize>) -> Self {
        Self::new(Some(r.start), Some(r.end))
    }
}

impl From<RangeTo<isize>> for SliceSpec {
    fn from(r: RangeTo<isize>) -> Self {
        Self::to(r.end)
    }
}

impl From<RangeFrom<isize>> for SliceSpec {
    fn from(r: RangeFrom<isize>) -> Self {
        Self::starting_at(r.start)
    }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        Self::all()
    }
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Name(String),
    Index(isize),
    Slice(SliceSpec),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => write!(f, "{}", name),
            Segment::Index(i) => write!(f, "[{}]", i),
            Segment::Slice(s) => write!(f, "[{}]", s),
        }
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        Segment::Name(s.to_string())
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        Segment::Name(s)
    }
}

impl From<&String> for Segment {
    fn from(s: &String) -> Self {
        Segment::Name(s.clone())
    }
}

impl From<isize> for Segment {
    fn from(i: isize) -> Self {
        Segment::Index(i)
    }
}

impl From<i32> for Segment {
    fn from(i: i32) -> Self {
        Segment::Index(i as isize)
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i as isize)
    }
}

impl From<SliceSpec> for Segment {
    fn from(s: SliceSpec) -> Self {
        Segment::Slice(s)
    }
}

/// Addressing key accepted by `get`, `set` and `delete`.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Possibly delimited name, split on the configured delimiter
    Name(String),
    Index(isize),
    Slice(SliceSpec),
    /// Ordered segments, each taken literally
    Path(Vec<Segment>),
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{}", name),
            Key::Index(i) => write!(f, "{}", i),
            Key::Slice(s) => write!(f, "{}", s),
            Key::Path(segments) => write!(f, "{}", render_path(segments, ".")),
        }
    }
}

impl From<Segment> for Key {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Name(name) => Key::Path(vec![Segment::Name(name)]),
            Segment::Index(i) => Key::Index(i),
            Segment::Slice(s) => Key::Slice(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::Name(s.clone())
    }
}

impl From<isize> for Key {
    fn from(i: isize) -> Self {
        Key::Index(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Index(i as isize)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i as isize)
    }
}

impl From<SliceSpec> for Key {
    fn from(s: SliceSpec) -> Self {
        Key::Slice(s)
    }
}

impl From<Vec<Segment>> for Key {
    fn from(segments: Vec<Segment>) -> Self {
        Key::Path(segments)
    }
}

impl From<&[Segment]> for Key {
    fn from(segments: &[Segment]) -> Self {
        Key::Path(segments.to_vec())
    }
}

macro_rules! key_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Segment>),+> From<($($name,)+)> for Key {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Key::Path(vec![$($name.into()),+])
            }
        }
    };
}

key_from_tuple!(A);
key_from_tuple!(A, B);
key_from_tuple!(A, B, C);
key_from_tuple!(A, B, C, D);
key_from_tuple!(A, B, C, D, E);

/// Outcome of resolving a key against one level of a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The key addresses this level directly
    Single(Segment),
    /// The head addresses this level, the tail the child below it
    Recursed(Segment, Key),
}

/// Split a key into the segment for this level and the remaining path.
///
/// # Errors
/// Returns `InvalidArgument` for an empty explicit path.
pub fn resolve(key: Key, settings: &Settings) -> TreeResult<Resolved> {
    match key {
        Key::Name(name) => {
            if settings.use_delimited_keys {
                if let Some((head, tail)) = name.split_once(settings.delimiter.as_str()) {
                    return Ok(Resolved::Recursed(
                        Segment::Name(head.to_string()),
                        Key::Name(tail.to_string()),
                    ));
                }
            }
            Ok(Resolved::Single(Segment::Name(name)))
        }
        Key::Index(i) => Ok(Resolved::Single(Segment::Index(i))),
        Key::Slice(s) => Ok(Resolved::Single(Segment::Slice(s))),
        Key::Path(mut segments) => match segments.len() {
            0 => Err(TreeError::InvalidArgument("cannot recurse with empty key".to_string())),
            1 => Ok(Resolved::Single(segments.remove(0))),
            _ => {
                let head = segments.remove(0);
                Ok(Resolved::Recursed(head, Key::Path(segments)))
            }
        },
    }
}

/// Expand a key into the literal segments it addresses.
pub fn key_segments(key: Key, settings: &Settings) -> Vec<Segment> {
    match key {
        Key::Name(name) if settings.use_delimited_keys => name
            .split(settings.delimiter.as_str())
            .map(|part| Segment::Name(part.to_string()))
            .collect(),
        Key::Name(name) => vec![Segment::Name(name)],
        Key::Index(i) => vec![Segment::Index(i)],
        Key::Slice(s) => vec![Segment::Slice(s)],
        Key::Path(segments) => segments,
    }
}

/// Render segments the way flattened keys are written: `l[0].b`, `[1][2]`.
pub fn render_path(segments: &[Segment], delimiter: &str) -> String {
    let mut rendered = String::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Name(name) => {
                if i > 0 {
                    rendered.push_str(delimiter);
                }
                rendered.push_str(name);
            }
            other => rendered.push_str(&other.to_string()),
        }
    }
    rendered
}

/// Parse a flattened key (`l[0][1].b`) back into segments.
///
/// # Errors
/// Returns `InvalidArgument` if an index does not fit into `isize`.
pub fn parse_flat_key(key: &str, delimiter: &str) -> TreeResult<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in key.split(delimiter) {
        let (name, suffix) = match INDEX_SUFFIX.captures(part) {
            Some(caps) => (
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
            ),
            None => (part, ""),
        };
        if !name.is_empty() || suffix.is_empty() {
            segments.push(Segment::Name(name.to_string()));
        }
        for caps in INDEX.captures_iter(suffix) {
            let index = caps[1]
                .parse::<isize>()
                .map_err(|e| TreeError::InvalidArgument(format!("index in '{}': {}", key, e)))?;
            segments.push(Segment::Index(index));
        }
    }
    Ok(segments)
}
