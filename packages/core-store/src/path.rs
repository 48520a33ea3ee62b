//! Property paths: dot-joined addresses of one scalar inside a flattened record.

use std::fmt;
use std::str::FromStr;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// A segment was empty (`a..b`, leading or trailing dot).
    #[error("empty path segment at position {position}")]
    EmptySegment { position: usize },

    /// A segment contains the separator and could not be rendered unambiguously.
    #[error("invalid path segment '{segment}' at position {position}: contains '.'")]
    InvalidSegment { segment: String, position: usize },
}

/// The ordered segments addressing one property of a flattened record.
///
/// Segments are non-empty and never contain the `.` separator, so the
/// rendered form (`address.city`, `tags.0`) parses back to the same path.
/// The root path has no segments and renders as the empty string.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PropertyPath {
    segments: Vec<String>,
}

/// Separator used when rendering a path to a store property name.
pub const SEPARATOR: char = '.';

impl PropertyPath {
    /// The empty (root) path.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a rendered path.
    ///
    /// The empty string is the root path. Any other input must consist of
    /// non-empty segments separated by `.`.
    ///
    /// ```rust
    /// use flatstore_core::PropertyPath;
    ///
    /// let path = PropertyPath::parse("address.city").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert!(PropertyPath::parse("address..city").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for (position, segment) in s.split(SEPARATOR).enumerate() {
            if segment.is_empty() {
                return Err(PathError::EmptySegment { position });
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from segments, validating each.
    pub fn try_from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    fn validate_segment(segment: &str, position: usize) -> Result<(), PathError> {
        if segment.is_empty() {
            return Err(PathError::EmptySegment { position });
        }
        if segment.contains(SEPARATOR) {
            return Err(PathError::InvalidSegment {
                segment: segment.to_string(),
                position,
            });
        }
        Ok(())
    }

    /// Extend this path with one named segment.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        Self::validate_segment(&segment, self.segments.len())?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Extend this path with a list index. Indices are always valid segments.
    #[must_use]
    pub fn index(&self, i: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(i.to_string());
        Self { segments }
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &PropertyPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Check if this path is the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Iterate over segments.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.segments.iter()
    }

    /// The segments as a slice.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Check if this path has the given prefix.
    pub fn has_prefix(&self, prefix: &PropertyPath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix.segments == self.segments[..prefix.segments.len()]
    }

    /// Strip a prefix from this path.
    ///
    /// Returns `None` if the prefix doesn't match.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &PropertyPath) -> Option<Self> {
        if self.has_prefix(prefix) {
            Some(Self {
                segments: self.segments[prefix.segments.len()..].to_vec(),
            })
        } else {
            None
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{}", SEPARATOR)?;
            }
            first = false;
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for PropertyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::ops::Index<usize> for PropertyPath {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.segments[i]
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use flatstore_core::path;
///
/// let p = path!("address.city");
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::PropertyPath::parse($s).expect("invalid path literal")
    };
}
