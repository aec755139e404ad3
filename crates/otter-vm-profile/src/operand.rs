//! Profile site operands

use std::fmt;
use std::str::FromStr;

use crate::error::ProfileError;

/// Offset of an instruction within a code block's bytecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct BytecodeIndex(pub u32);

impl BytecodeIndex {
    /// Create a new bytecode index
    #[inline]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    /// Get offset value
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }
}

impl From<u32> for BytecodeIndex {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

impl fmt::Display for BytecodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bc#{}", self.0)
    }
}

/// A virtual register or temporary read by an instruction.
///
/// Written as `argN`, `locN` or `tmpN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operand {
    /// Incoming argument (`arg0` is `this`)
    Argument(u32),
    /// Local variable slot
    Local(u32),
    /// Compiler temporary
    Tmp(u32),
}

impl Operand {
    /// Create an argument operand
    #[inline]
    pub const fn argument(index: u32) -> Self {
        Self::Argument(index)
    }

    /// Create a local operand
    #[inline]
    pub const fn local(index: u32) -> Self {
        Self::Local(index)
    }

    /// Create a temporary operand
    #[inline]
    pub const fn tmp(index: u32) -> Self {
        Self::Tmp(index)
    }

    /// Get operand index within its class
    #[inline]
    pub const fn index(self) -> u32 {
        match self {
            Self::Argument(index) | Self::Local(index) | Self::Tmp(index) => index,
        }
    }

    /// Check if operand is an argument
    #[inline]
    pub const fn is_argument(self) -> bool {
        matches!(self, Self::Argument(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(index) => write!(f, "arg{index}"),
            Self::Local(index) => write!(f, "loc{index}"),
            Self::Tmp(index) => write!(f, "tmp{index}"),
        }
    }
}

impl FromStr for Operand {
    type Err = ProfileError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parse_index = |digits: &str| {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ProfileError::InvalidOperand(text.to_string()));
            }
            digits
                .parse::<u32>()
                .map_err(|_| ProfileError::OperandIndexOutOfRange(text.to_string()))
        };

        if let Some(rest) = text.strip_prefix("arg") {
            parse_index(rest).map(Operand::Argument)
        } else if let Some(rest) = text.strip_prefix("loc") {
            parse_index(rest).map(Operand::Local)
        } else if let Some(rest) = text.strip_prefix("tmp") {
            parse_index(rest).map(Operand::Tmp)
        } else {
            Err(ProfileError::InvalidOperand(text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytecode_index() {
        let index = BytecodeIndex::new(10);
        assert_eq!(index.offset(), 10);
        assert_eq!(index.to_string(), "bc#10");
    }

    #[test]
    fn test_operand_display_roundtrip() {
        for text in ["arg0", "loc7", "tmp12"] {
            let operand: Operand = text.parse().unwrap();
            assert_eq!(operand.to_string(), text);
        }
        assert_eq!("arg3".parse::<Operand>().unwrap(), Operand::argument(3));
        assert!(Operand::argument(0).is_argument());
        assert!(!Operand::local(0).is_argument());
    }

    #[test]
    fn test_operand_rejects_malformed_text() {
        for text in ["", "arg", "r1", "loc-1", "tmp1x", "ARG0"] {
            assert_eq!(
                text.parse::<Operand>(),
                Err(ProfileError::InvalidOperand(text.to_string()))
            );
        }
        assert_eq!(
            "loc99999999999".parse::<Operand>(),
            Err(ProfileError::OperandIndexOutOfRange(
                "loc99999999999".to_string()
            ))
        );
    }
}
