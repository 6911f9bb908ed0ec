//! Client engine for the résumé → job matching service.
//!
//! Streams a résumé summary, ranks jobs against it, and streams cover letters,
//! while keeping a filterable board of every active job.

pub mod accumulator;
pub mod backend;
pub mod config;
pub mod errors;
pub mod filter;
pub mod models;
pub mod reveal;
pub mod session;
pub mod session_engine;
pub mod stream;

pub use accumulator::Channel;
pub use backend::{AnalysisBackend, HttpBackend};
pub use errors::{ClientError, FailureKind};
pub use session_engine::{AnalysisSession, CoverLetterOutcome, Phase, SessionSnapshot, SubmitOutcome};
