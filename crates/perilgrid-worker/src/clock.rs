// perilgrid-worker/src/clock.rs
// ============================================================================
// Module: System Clock
// Description: Wall-clock implementation of the core Clock seam.
// Purpose: Supply real timestamps at the process boundary.
// Dependencies: perilgrid-core
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time; hosts supply it. [`SystemClock`]
//! is the deployment implementation; tests substitute fixed clocks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use perilgrid_core::Clock;
use perilgrid_core::Timestamp;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::from_unix_millis(millis)
    }
}
