use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a pivot node.
    NodeId,
    "n"
);
entity_id!(
    /// Identifier of a rigid stick.
    StickId,
    "s"
);
entity_id!(LineId, "l");
entity_id!(CircleId, "c");
entity_id!(AttachmentId, "a");

/// The single positional constraint a node may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeConstraint {
    Line(LineId),
    Circle(CircleId),
    Attachment(AttachmentId),
}

/// A pivot. Anchored nodes have infinite mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: DVec2,
    pub anchored: bool,
    pub constraint: Option<NodeConstraint>,
}

impl Node {
    pub fn new(id: NodeId, position: DVec2) -> Self {
        Self {
            id,
            position,
            anchored: false,
            constraint: None,
        }
    }

    pub fn line(&self) -> Option<LineId> {
        match self.constraint {
            Some(NodeConstraint::Line(id)) => Some(id),
            _ => None,
        }
    }

    pub fn circle(&self) -> Option<CircleId> {
        match self.constraint {
            Some(NodeConstraint::Circle(id)) => Some(id),
            _ => None,
        }
    }

    pub fn attachment(&self) -> Option<AttachmentId> {
        match self.constraint {
            Some(NodeConstraint::Attachment(id)) => Some(id),
            _ => None,
        }
    }
}

/// Rigid distance constraint between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stick {
    pub id: StickId,
    pub a: NodeId,
    pub b: NodeId,
    pub rest_length: f64,
    pub visible: bool,
}

impl Stick {
    pub fn touches(&self, node: NodeId) -> bool {
        self.a == node || self.b == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.a == node {
            Some(self.b)
        } else if self.b == node {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Infinite line through `a` and `b`; only the direction matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineConstraint {
    pub id: LineId,
    pub a: DVec2,
    pub b: DVec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleConstraint {
    pub id: CircleId,
    pub center: DVec2,
    pub radius: f64,
}

/// Binds `node` to `(1 - t) * host.a + t * host.b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentConstraint {
    pub id: AttachmentId,
    pub node: NodeId,
    pub host: StickId,
    pub t: f64,
}

/// Reference to any selectable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Node(NodeId),
    Stick(StickId),
    Line(LineId),
    Circle(CircleId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Node(id) => write!(f, "{id}"),
            EntityRef::Stick(id) => write!(f, "{id}"),
            EntityRef::Line(id) => write!(f, "{id}"),
            EntityRef::Circle(id) => write!(f, "{id}"),
        }
    }
}
