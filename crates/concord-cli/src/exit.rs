//! Exit code mapping (spec §6): 0 ok; 1 invalid argument or unreachable
//! master; 2 configuration error; 3 protocol error; 4 client timeout (a
//! distinct non-zero code per spec §7, not one of the four §6 names);
//! 127 exec failure of an adapter.

use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Ok,
    InvalidArgument,
    ConfigError,
    ProtocolError,
    Timeout,
    AdapterExecFailure,
}

impl ExitKind {
    pub fn code(self) -> u8 {
        match self {
            ExitKind::Ok => 0,
            ExitKind::InvalidArgument => 1,
            ExitKind::ConfigError => 2,
            ExitKind::ProtocolError => 3,
            ExitKind::Timeout => 4,
            ExitKind::AdapterExecFailure => 127,
        }
    }
}

impl From<ExitKind> for ExitCode {
    fn from(kind: ExitKind) -> Self {
        ExitCode::from(kind.code())
    }
}
