//! Standard property structures
//!
//! Control-system records conventionally carry a `value` field plus a set of
//! property structures (`alarm`, `timeStamp`, `display`, `control`). These
//! helpers build the usual layouts so callers do not have to spell them out.

use crate::field::{FieldType, ScalarType, StructureType};

/// Type id used for scalar records
pub const SCALAR_ID: &str = "epics:nt/NTScalar:1.0";
/// Type id used for scalar array records
pub const SCALAR_ARRAY_ID: &str = "epics:nt/NTScalarArray:1.0";

/// Name of the time stamp property
pub const TIME_STAMP: &str = "timeStamp";
/// Name of the alarm property
pub const ALARM: &str = "alarm";
/// Name of the display property
pub const DISPLAY: &str = "display";
/// Name of the control property
pub const CONTROL: &str = "control";

fn scalars(id: &str, members: &[(&str, ScalarType)]) -> StructureType {
    StructureType::from_parts(
        id,
        members
            .iter()
            .map(|(n, t)| (n.to_string(), FieldType::Scalar(*t)))
            .collect(),
    )
}

/// `alarm_t { int severity; int status; string message }`
pub fn alarm() -> StructureType {
    scalars(
        "alarm_t",
        &[
            ("severity", ScalarType::Int),
            ("status", ScalarType::Int),
            ("message", ScalarType::String),
        ],
    )
}

/// `time_t { long secondsPastEpoch; int nanoseconds; int userTag }`
pub fn time_stamp() -> StructureType {
    scalars(
        "time_t",
        &[
            ("secondsPastEpoch", ScalarType::Long),
            ("nanoseconds", ScalarType::Int),
            ("userTag", ScalarType::Int),
        ],
    )
}

/// `display_t { double limitLow; double limitHigh; string description; string format; string units }`
pub fn display() -> StructureType {
    scalars(
        "display_t",
        &[
            ("limitLow", ScalarType::Double),
            ("limitHigh", ScalarType::Double),
            ("description", ScalarType::String),
            ("format", ScalarType::String),
            ("units", ScalarType::String),
        ],
    )
}

/// `control_t { double limitLow; double limitHigh; double minStep }`
pub fn control() -> StructureType {
    scalars(
        "control_t",
        &[
            ("limitLow", ScalarType::Double),
            ("limitHigh", ScalarType::Double),
            ("minStep", ScalarType::Double),
        ],
    )
}

/// Property structures selected by a comma separated list
///
/// Properties are emitted in a fixed order regardless of the order in
/// `properties`; unknown names are ignored.
fn properties(properties: &str) -> Vec<(String, FieldType)> {
    let wanted: Vec<&str> = properties.split(',').map(str::trim).collect();
    let known: [(&str, fn() -> StructureType); 4] = [
        (ALARM, alarm),
        (TIME_STAMP, time_stamp),
        (DISPLAY, display),
        (CONTROL, control),
    ];
    known
        .iter()
        .filter(|(name, _)| wanted.contains(name))
        .map(|(name, make)| (name.to_string(), FieldType::Structure(make())))
        .collect()
}

/// Scalar record layout: `value` followed by the requested properties
///
/// ```
/// use pvdatabase_core::{standard, ScalarType};
///
/// let t = standard::scalar(ScalarType::Double, "alarm,timeStamp");
/// assert!(t.field("value").is_some());
/// assert!(t.field("timeStamp").is_some());
/// assert!(t.field("display").is_none());
/// ```
pub fn scalar(scalar_type: ScalarType, props: &str) -> StructureType {
    let mut fields = vec![("value".to_string(), FieldType::Scalar(scalar_type))];
    fields.extend(properties(props));
    StructureType::from_parts(SCALAR_ID, fields)
}

/// Scalar array record layout: `value[]` followed by the requested properties
pub fn scalar_array(element_type: ScalarType, props: &str) -> StructureType {
    let mut fields = vec![("value".to_string(), FieldType::ScalarArray(element_type))];
    fields.extend(properties(props));
    StructureType::from_parts(SCALAR_ARRAY_ID, fields)
}
