//! The daemon-level error type, wrapping every sub-crate's error behind one
//! `Kind` tag (spec §7, SPEC_FULL §11).

use std::fmt;

use concord_api::Kind;

#[derive(Debug)]
pub struct Error {
    pub kind: Kind,
    pub message: String,
}

impl Error {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(Kind::ParseError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<concord_cfg::CompileError> for Error {
    fn from(e: concord_cfg::CompileError) -> Self {
        let kind = match &e {
            concord_cfg::CompileError::CyclicDependency(_) => Kind::CyclicDependency,
            concord_cfg::CompileError::Resource(re) => map_resource_kind(re.kind),
            concord_cfg::CompileError::UnknownPolicy(_) | concord_cfg::CompileError::UnknownResource(_, _) => {
                Kind::NotFound
            }
            concord_cfg::CompileError::ParseError(_) => Kind::ParseError,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<concord_resources::ResourceError> for Error {
    fn from(e: concord_resources::ResourceError) -> Self {
        Self::new(map_resource_kind(e.kind), e.message.clone())
    }
}

impl From<concord_cert::CertError> for Error {
    fn from(e: concord_cert::CertError) -> Self {
        let kind = match e.kind {
            concord_cert::Kind::Io => Kind::Io,
            concord_cert::Kind::ParseError => Kind::ParseError,
            concord_cert::Kind::InvalidValue => Kind::InvalidValue,
            concord_cert::Kind::Untrusted => Kind::Untrusted,
            concord_cert::Kind::AlreadyExists => Kind::AlreadyExists,
        };
        Self::new(kind, e.message.clone())
    }
}

impl From<concord_api::ApiError> for Error {
    fn from(e: concord_api::ApiError) -> Self {
        Self::new(e.kind, e.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(Kind::Io, e.to_string())
    }
}

fn map_resource_kind(kind: concord_resources::Kind) -> Kind {
    match kind {
        concord_resources::Kind::ParseError => Kind::ParseError,
        concord_resources::Kind::InvalidValue => Kind::InvalidValue,
        concord_resources::Kind::UnknownAttribute => Kind::UnknownAttribute,
        concord_resources::Kind::NotFound => Kind::NotFound,
        concord_resources::Kind::PermissionDenied => Kind::PermissionDenied,
        concord_resources::Kind::RemediationFailed => Kind::RemediationFailed,
    }
}

pub type Result<T> = std::result::Result<T, Error>;
