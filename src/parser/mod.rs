pub mod aggregate;
pub mod device;
pub mod normalize;
pub mod problems;

use serde_json::Value;

use crate::models::AggregateResponse;

/// Raw device mappings loaded from disk → parsed records → aggregate.
pub fn process_values(raw: &[Value]) -> AggregateResponse {
    let records = raw
        .iter()
        .map(device::parse_value)
        .filter_map(|rec| serde_json::to_value(rec).ok());
    aggregate::format(records)
}
