//! Primitive identifiers, weights and their sentinels

/// Node identifier (node-based or edge-based, depending on context)
pub type NodeId = u32;

/// Edge identifier / index into an edge array
pub type EdgeId = u32;

/// Edge weight in deciseconds
pub type EdgeWeight = i32;

/// "No node" sentinel; also marks ignored turn restrictions
pub const SPECIAL_NODEID: NodeId = u32::MAX;

/// "Edge not found" sentinel returned by graph lookups
pub const SPECIAL_EDGEID: EdgeId = u32::MAX;

/// Name index meaning "unnamed"
pub const INVALID_NAME_ID: u32 = u32::MAX;

/// Unreachable / unset weight
pub const INVALID_EDGE_WEIGHT: EdgeWeight = i32::MAX;
