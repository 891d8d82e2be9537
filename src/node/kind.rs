use std::fmt;

/// The closed-set (plus domain-specific) kind tag every node carries.
///
/// `kind()` is informational for most nodes (event payloads, diagnostics),
/// with one exception the scheduler actually branches on:
/// [`NodeKind::Merge`] nodes are dispatched to [`crate::node::Node::merge`]
/// instead of `execute` (see §4.2 and §4.5 of the design).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeKind {
    Noop,
    Func,
    Merge,
    Cache,
    Map,
    Filter,
    Transform,
    Human,
    Router,
    Gate,
    /// Domain-specific kinds the core engine does not special-case.
    Custom(String),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => write!(f, "noop"),
            Self::Func => write!(f, "func"),
            Self::Merge => write!(f, "merge"),
            Self::Cache => write!(f, "cache"),
            Self::Map => write!(f, "map"),
            Self::Filter => write!(f, "filter"),
            Self::Transform => write!(f, "transform"),
            Self::Human => write!(f, "human"),
            Self::Router => write!(f, "router"),
            Self::Gate => write!(f, "gate"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl NodeKind {
    #[must_use]
    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merge)
    }
}
