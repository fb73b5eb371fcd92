use std::fmt;

/// The error kinds shared across the core (spec §7), narrowed to the ones a
/// resource operation can actually raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ParseError,
    InvalidValue,
    UnknownAttribute,
    NotFound,
    PermissionDenied,
    RemediationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceError {
    pub kind: Kind,
    pub message: String,
}

impl ResourceError {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_attribute(name: &str) -> Self {
        Self::new(Kind::UnknownAttribute, format!("unknown attribute '{name}'"))
    }

    pub fn invalid_value(attr: &str, value: &str) -> Self {
        Self::new(
            Kind::InvalidValue,
            format!("invalid value '{value}' for attribute '{attr}'"),
        )
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(Kind::NotFound, format!("{what} not found"))
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ResourceError {}

pub type Result<T> = std::result::Result<T, ResourceError>;
