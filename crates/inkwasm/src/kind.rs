use std::fmt;

/// Script-side type of an [`Object`](crate::Object).
///
/// The discriminants are part of the wire format shared with the script
/// runtime and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    Undefined = 0,
    Null = 1,
    Boolean = 2,
    Number = 3,
    BigInt = 4,
    String = 5,
    Symbol = 6,
    Function = 7,
    Object = 8,
}

impl ObjectType {
    /// Decode a wire tag. Unknown tags read as `Undefined`.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => ObjectType::Null,
            2 => ObjectType::Boolean,
            3 => ObjectType::Number,
            4 => ObjectType::BigInt,
            5 => ObjectType::String,
            6 => ObjectType::Symbol,
            7 => ObjectType::Function,
            8 => ObjectType::Object,
            _ => ObjectType::Undefined,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether values of this type are held by reference on the script side
    /// and must be released.
    pub fn holds_reference(self) -> bool {
        matches!(
            self,
            ObjectType::BigInt
                | ObjectType::String
                | ObjectType::Symbol
                | ObjectType::Function
                | ObjectType::Object
        )
    }

    /// The `typeof` name.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Undefined => "undefined",
            ObjectType::Null => "null",
            ObjectType::Boolean => "boolean",
            ObjectType::Number => "number",
            ObjectType::BigInt => "bigint",
            ObjectType::String => "string",
            ObjectType::Symbol => "symbol",
            ObjectType::Function => "function",
            ObjectType::Object => "object",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for tag in 0..=8u8 {
            assert_eq!(ObjectType::from_tag(tag).tag(), tag);
        }
        assert_eq!(ObjectType::from_tag(200), ObjectType::Undefined);
    }

    #[test]
    fn reference_kinds() {
        assert!(ObjectType::String.holds_reference());
        assert!(ObjectType::BigInt.holds_reference());
        assert!(!ObjectType::Number.holds_reference());
        assert!(!ObjectType::Null.holds_reference());
    }
}
