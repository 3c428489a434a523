//! Field paths for addressing values inside a payload
//!
//! Provides [`FieldPath`] for naming the location of a validation issue and
//! for addressing the value a repair pass rewrites.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Rendering of the empty (root) path
const ROOT: &str = "<root>";

/// One step of a [`FieldPath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

/// Path within a JSON payload
///
/// # Examples
/// - `["action_items", 2, "priority"]` → `action_items[2].priority`
/// - `[]` → `<root>`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of a top-level field
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![Segment::Key(name.into())])
    }

    /// Append an object key, returning new path
    #[inline]
    #[must_use]
    pub fn key(&self, name: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(Segment::Key(name.into()));
        new
    }

    /// Append an array index, returning new path
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut new = self.clone();
        new.0.push(Segment::Index(index));
        new
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path has no segments
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build a path from a JSON pointer, using `root` to tell array indices
    /// from numeric object keys.
    ///
    /// Segments past the point where `root` stops resolving are treated as keys.
    #[must_use]
    pub fn from_pointer(pointer: &str, root: &Value) -> Self {
        let mut segments = Vec::new();
        let mut current = Some(root);

        for raw in pointer.split('/').skip(1) {
            let token = raw.replace("~1", "/").replace("~0", "~");
            match current {
                Some(Value::Array(items)) => match token.parse::<usize>() {
                    Ok(idx) => {
                        current = items.get(idx);
                        segments.push(Segment::Index(idx));
                    }
                    Err(_) => {
                        current = None;
                        segments.push(Segment::Key(token));
                    }
                },
                Some(Value::Object(map)) => {
                    current = map.get(&token);
                    segments.push(Segment::Key(token));
                }
                _ => {
                    current = None;
                    segments.push(Segment::Key(token));
                }
            }
        }

        Self(segments)
    }

    /// Render as a JSON pointer (RFC 6901)
    #[must_use]
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                Segment::Key(key) => out.push_str(&key.replace('~', "~0").replace('/', "~1")),
                Segment::Index(idx) => out.push_str(&idx.to_string()),
            }
        }
        out
    }

    /// Resolve the path against a value
    #[inline]
    #[must_use]
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        value.pointer(&self.to_pointer())
    }

    /// Resolve the path against a value, mutably
    #[inline]
    pub fn lookup_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        value.pointer_mut(&self.to_pointer())
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(ROOT);
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == ROOT {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for part in s.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.is_empty() && segments.is_empty() && rest.is_empty() {
                return Err(PathError::EmptySegment);
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            } else if rest.is_empty() {
                return Err(PathError::EmptySegment);
            }
            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| PathError::InvalidIndex(part.to_string()))?;
                let idx = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| PathError::InvalidIndex(part.to_string()))?;
                segments.push(Segment::Index(idx));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(PathError::InvalidIndex(part.to_string()));
                }
            }
        }

        Ok(Self(segments))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment between separators
    #[error("empty path segment")]
    EmptySegment,

    /// Malformed `[n]` index
    #[error("invalid index in segment: {0}")]
    InvalidIndex(String),
}
