//! Input validation for values entering the digest engine.

use crate::error::{CoreError, Result};
use crate::record::RecordLink;
use crate::stream::StreamDescriptor;

/// Validate a stream descriptor before it is digested.
///
/// Every field must be non-empty and free of NUL characters.
pub fn validate_descriptor(descriptor: &StreamDescriptor) -> Result<()> {
    check_field("name", &descriptor.name)?;
    check_field("type", &descriptor.type_name)?;
    check_field("serialization format", &descriptor.serialization_format)?;
    Ok(())
}

/// Validate a record link before it is digested.
pub fn validate_link(link: &RecordLink<'_>) -> Result<()> {
    if !link.stream_id.is_assigned() {
        return Err(CoreError::InvalidInput(format!(
            "record references unassigned stream id {}",
            link.stream_id
        )));
    }
    Ok(())
}

fn check_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "stream {field} must not be empty"
        )));
    }
    if value.contains('\0') {
        return Err(CoreError::InvalidInput(format!(
            "stream {field} contains a NUL character"
        )));
    }
    Ok(())
}
