//! Values passed in from the host environment.

/// Type tag of a host value, as seen at the module boundary.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostValueKind {
    Undefined = 0,
    Null = 1,
    Boolean = 2,
    Number = 3,
    String = 4,
    Object = 5,
}

impl HostValueKind {
    /// Decode a raw tag; unknown tags are treated as objects.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Undefined,
            1 => Self::Null,
            2 => Self::Boolean,
            3 => Self::Number,
            4 => Self::String,
            _ => Self::Object,
        }
    }
}

/// A decoded call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object,
}

impl HostValue {
    /// Returns the text if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_raw_tag() {
        for kind in [
            HostValueKind::Undefined,
            HostValueKind::Null,
            HostValueKind::Boolean,
            HostValueKind::Number,
            HostValueKind::String,
            HostValueKind::Object,
        ] {
            assert_eq!(HostValueKind::from_raw(kind as u32), kind);
        }
        assert_eq!(HostValueKind::from_raw(99), HostValueKind::Object);
    }

    #[test]
    fn test_only_strings_expose_text() {
        assert_eq!(HostValue::from("abc").as_str(), Some("abc"));
        assert_eq!(HostValue::from(42.0).as_str(), None);
        assert_eq!(HostValue::Null.as_str(), None);
    }
}
