//! Value normalisation for parameters the caller did not supply.
//!
//! The remote API rejects an empty string for structured parameters, so an
//! empty value is replaced by `[]` or `{}` depending on the declared type.
//! The literal text `null` and the JSON-encoded empty string `""` count as
//! empty.

use crate::wire::ParamDescriptor;

/// Structural shape inferred for a parameter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueShape {
    /// JSON array; empty value becomes `[]`.
    List,
    /// JSON object; empty value becomes `{}`.
    Map,
    /// Anything else; empty value stays empty.
    Scalar,
}

impl ValueShape {
    const fn empty_value(self) -> &'static str {
        match self {
            Self::List => "[]",
            Self::Map => "{}",
            Self::Scalar => "",
        }
    }
}

const SCALAR_TYPES: [&str; 6] = ["string", "text", "integer", "int", "number", "boolean"];

/// Infers the shape of `descriptor`.
///
/// The declared data type decides when it names a structured or a known
/// scalar type. Otherwise the name, code, label and catalogue key are scanned,
/// with list hints taking precedence over map hints.
#[must_use]
pub fn shape_of(descriptor: &ParamDescriptor) -> ValueShape {
    let data_type = descriptor.data_type.trim().to_lowercase();
    if let Some(shape) = structured_shape(&data_type) {
        return shape;
    }
    if SCALAR_TYPES.contains(&data_type.as_str()) {
        return ValueShape::Scalar;
    }

    let hints = [
        descriptor.name.as_str(),
        descriptor.code.as_str(),
        descriptor.label.as_str(),
        descriptor.svc_operation_cfs_param.as_str(),
    ]
    .join(" ")
    .to_lowercase();
    structured_shape(&hints).unwrap_or(ValueShape::Scalar)
}

fn structured_shape(text: &str) -> Option<ValueShape> {
    if text.contains("array") || text.contains("list") {
        Some(ValueShape::List)
    } else if text.contains("map") || text.contains("json") {
        Some(ValueShape::Map)
    } else {
        None
    }
}

/// Reports whether `value` is empty once trimmed, treating `null` and `""`
/// as empty.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") || trimmed == "\"\""
}

/// Computes the value to submit for `descriptor` from `supplied`.
///
/// A non-blank value is returned trimmed. A blank value becomes `[]` for
/// list-shaped parameters, `{}` for map-shaped ones and the empty string
/// otherwise.
///
/// ```
/// use nubes_lifecycle::normalize::normalize;
/// use nubes_lifecycle::wire::ParamDescriptor;
///
/// let descriptor = ParamDescriptor {
///     data_type: String::from("map"),
///     ..ParamDescriptor::default()
/// };
/// assert_eq!(normalize(&descriptor, "null"), "{}");
/// assert_eq!(normalize(&descriptor, r#" {"a":1} "#), r#"{"a":1}"#);
/// ```
#[must_use]
pub fn normalize(descriptor: &ParamDescriptor, supplied: &str) -> String {
    if is_blank(supplied) {
        shape_of(descriptor).empty_value().to_owned()
    } else {
        supplied.trim().to_owned()
    }
}
