use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step of a [`NodePath`]: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node inside the raw document tree.
///
/// Rendered as `scenes.Hello.ui[2]`: keys are dot-separated, indices are
/// bracketed. The root path renders as `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// A new path extended by a mapping key.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// A new path extended by a sequence index.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The enclosing path, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Error returned when a path string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node path: {0}")]
pub struct ParsePathError(String);

impl FromStr for NodePath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "$" || s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if !key.is_empty() {
                segments.push(PathSegment::Key(key.to_string()));
            }
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped
                    .find(']')
                    .ok_or_else(|| ParsePathError(s.to_string()))?;
                let index = stripped[..close]
                    .parse::<usize>()
                    .map_err(|_| ParsePathError(s.to_string()))?;
                segments.push(PathSegment::Index(index));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return Err(ParsePathError(s.to_string()));
            }
        }
        Ok(Self { segments })
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_display() {
        assert_eq!(NodePath::root().to_string(), "$");
        assert!(NodePath::root().is_root());
    }

    #[test]
    fn test_widget_path_display() {
        let path = NodePath::root().key("scenes").key("Hello").key("ui").index(2);
        assert_eq!(path.to_string(), "scenes.Hello.ui[2]");
    }

    #[test]
    fn test_nested_action_path_display() {
        let path = NodePath::root()
            .key("scenes")
            .key("Main")
            .key("ui")
            .index(0)
            .key("action")
            .key("then")
            .index(1);
        assert_eq!(path.to_string(), "scenes.Main.ui[0].action.then[1]");
    }

    #[test]
    fn test_parent() {
        let path = NodePath::root().key("scenes").key("Main");
        assert_eq!(path.parent(), Some(NodePath::root().key("scenes")));
        assert_eq!(NodePath::root().parent(), None);
    }

    #[test]
    fn test_parse_display_agree() {
        let text = "scenes.Hello.ui[2].options[0]";
        let path: NodePath = text.parse().unwrap();
        assert_eq!(path.to_string(), text);
        assert_eq!(path.segments().len(), 5);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("scenes.ui[x]".parse::<NodePath>().is_err());
        assert!("scenes.ui[1".parse::<NodePath>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let path = NodePath::root().key("scenes").index(0);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"scenes[0]\"");
        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
