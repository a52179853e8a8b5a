//! Towel determinism service
//!
//! Makes a server's "current time" and "new identifier" calls reproducible
//! across test runs:
//! - [`sequence`] holds the seeded clock and identifier sequences
//! - [`server`] exposes them over HTTP, one value per request
//! - [`provider`] lets the system under test swap its clock and identifier
//!   strategies for ones that query the service, and swap them back

pub mod error;
pub mod provider;
pub mod sequence;
pub mod server;

pub use error::{DeterminismError, DeterminismResult};
pub use provider::{Clock, IdSource, Providers, Redirection, RemoteClock, RemoteIds};
pub use sequence::{DeterminismState, SeededIds, SyntheticClock};
pub use server::{DeterminismServer, ServiceHandle, CLOCK_PATH, ID_PATH};
