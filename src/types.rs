//! Newtypes for remote identifiers to avoid stringly- and integer-typed code.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! uid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                let raw = value.into();
                Self(raw.trim().to_owned())
            }

            /// Borrows the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

macro_rules! numeric_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd,
            Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the raw numeric value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uid_newtype!(
    /// Opaque identifier the remote side assigns to an instance.
    InstanceUid
);
uid_newtype!(
    /// Opaque identifier the remote side assigns to an instance operation.
    OperationUid
);

numeric_newtype!(
    /// Service catalogue identifier selecting the resource kind.
    ServiceId
);
numeric_newtype!(
    /// Catalogue identifier of one operation parameter.
    ParamId
);
numeric_newtype!(
    /// Catalogue identifier of an operation definition offered by a service.
    SvcOperationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_newtype_trims_input() {
        let uid = InstanceUid::new("  abc  ");
        assert_eq!(uid.as_str(), "abc");
        assert_eq!(uid.to_string(), "abc");
    }

    #[test]
    fn numeric_newtype_serialises_transparently() {
        let json = serde_json::to_string(&ParamId(198)).expect("serialise");
        assert_eq!(json, "198");
        let parsed: ServiceId = serde_json::from_str("12").expect("deserialise");
        assert_eq!(parsed, ServiceId(12));
    }
}
