//! Session identity: one opaque identifier per client process.
//!
//! Every request that participates in the summary → match → cover-letter flow
//! carries it in the `X-Session-Id` header.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use serde::Serialize;
use tracing::warn;
use uuid::{Builder, Uuid};

pub const SESSION_HEADER: &str = "X-Session-Id";

/// Immutable for the lifetime of the process. A new process yields a new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a v4 identifier from the OS random source, falling back to a
    /// time-seeded generator when the OS source is unavailable. Never fails.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        if let Err(e) = OsRng.try_fill_bytes(&mut bytes) {
            warn!("OS random source unavailable ({e}); using fallback generator for session id");
            fallback_rng().fill_bytes(&mut bytes);
        }
        SessionId(Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

fn fallback_rng() -> StdRng {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let stack_marker = 0u8;
    let address = &stack_marker as *const u8 as u64;
    let seed = nanos ^ (u64::from(std::process::id()) << 32) ^ address.rotate_left(17);
    StdRng::seed_from_u64(seed)
}
