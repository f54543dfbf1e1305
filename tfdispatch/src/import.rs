//! Import helpers for simplifying resource import implementations

use crate::data::ResourceData;
use crate::error::{DispatchError, Result};
use std::collections::HashMap;

/// Separator of composite import ids (`sg-123:ingress:tcp:22:22:0.0.0.0/0`)
pub const ID_SEPARATOR: char = ':';

/// Sets the import ID as the resource id; the following read fills the rest
///
/// Example: ID "acl-123" -> state.id = "acl-123"
pub fn import_state_passthrough_id(id: &str) -> ResourceData {
    ResourceData::from_state(id, HashMap::new())
}

/// Splits a composite id into exactly `parts` pieces
pub fn parse_composite_id(id: &str, parts: usize) -> Result<Vec<String>> {
    let pieces: Vec<String> = id.splitn(parts, ID_SEPARATOR).map(str::to_string).collect();
    if pieces.len() != parts || pieces.iter().any(String::is_empty) {
        return Err(DispatchError::Validation(format!(
            "invalid id {:?}: expected {} parts separated by '{}'",
            id, parts, ID_SEPARATOR
        )));
    }
    Ok(pieces)
}
