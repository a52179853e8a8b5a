//! Towel golden-file test runner
//!
//! Replays the requests declared in a test directory's `towel.xml` against a
//! running HTTP server and compares each normalized response with a golden
//! file stored next to the suite.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TestRunner                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  suite::load(towel.xml) -> [TestCase]                       │
//! │  for each case, in document order:                          │
//! │    Dispatcher::dispatch  GET | POST | SETUP script          │
//! │    gate                  status + content type              │
//! │    NormalizerRegistry    canonical JSON / HTML text         │
//! │    golden::compare       stage <result>.tmp, unified diff   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  golden::fixate(dir)     promote every *.tmp to its golden  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod case;
pub mod dispatch;
pub mod error;
pub mod golden;
pub mod normalize;
pub mod runner;
pub mod suite;

pub use case::{Method, TestCase};
pub use dispatch::{Dispatched, Dispatcher, HttpTransport, ResponseResult, Transport};
pub use error::{TowelError, TowelResult};
pub use golden::Comparison;
pub use normalize::{HtmlNormalizer, JsonNormalizer, Normalizer, NormalizerRegistry};
pub use runner::{server_url, CaseReport, Outcome, RunReport, RunnerConfig, TestRunner};
