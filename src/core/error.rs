use super::ValueKind;
use std::fmt::Display;

/// Argument list of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Weak,
    Strong,
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weak => f.write_str("weak"),
            Self::Strong => f.write_str("strong"),
        }
    }
}

/// Misuse of arity or argument type contracts.
/// Reported at the point of misuse, nothing is ever corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Composer was declared without weak arguments.
    NoWeakArguments,
    /// Call supplied a different number of arguments than declared.
    ArityMismatch {
        slot: Slot,
        expected: usize,
        found: usize,
    },
    /// Weak argument isn't a reference type.
    NotAnObject {
        position: usize,
        name: Option<String>,
        found: ValueKind,
    },
}

impl ComposeError {
    pub fn arity(slot: Slot, expected: usize, found: usize) -> Self {
        Self::ArityMismatch {
            slot,
            expected,
            found,
        }
    }

    pub fn not_an_object(position: usize, name: Option<&str>, found: ValueKind) -> Self {
        Self::NotAnObject {
            position,
            name: name.map(str::to_owned),
            found,
        }
    }

    /// Calling again with different arguments can succeed.
    pub fn recoverable(&self) -> bool {
        match self {
            Self::NoWeakArguments => false,
            Self::ArityMismatch { .. } => true,
            Self::NotAnObject { .. } => true,
        }
    }

    pub fn unrecoverable(&self) -> bool {
        !self.recoverable()
    }
}

impl Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoWeakArguments => write!(
                f,
                "Composer needs at least one weak argument, use Hasher for strong only keys."
            ),
            Self::ArityMismatch {
                slot,
                expected,
                found,
            } => write!(
                f,
                "Expected {} {} arguments, found {}.",
                expected, slot, found
            ),
            Self::NotAnObject {
                position,
                name: Some(name),
                found,
            } => write!(
                f,
                "Weak argument #{} '{}' must be an object, found {}.",
                position, name, found
            ),
            Self::NotAnObject {
                position,
                name: None,
                found,
            } => write!(
                f,
                "Weak argument #{} must be an object, found {}.",
                position, found
            ),
        }
    }
}

impl std::error::Error for ComposeError {}
