//! Wire protocol types shared between the agent, the master, and the CLI:
//! frames and PDUs, job reports, and the error-kind tag carried on ERROR
//! PDUs.

pub mod error;
pub mod kind;
pub mod report;
pub mod transport;
pub mod wire;

pub use error::{ApiError, Result};
pub use kind::Kind;
pub use report::{Action, JobReport, Outcome, ResourceReport};
pub use transport::{Frame, Pdu, PduType, IDENTITY_LEN};
