//! Shared constants for end-to-end tests

/// Artist id used in discrepancy checks
pub const ARTIST_ID: &str = "artist-1";

/// Track with a catalog expectation
pub const TRACK_1_ID: &str = "track-1";

/// Track without catalog metadata
pub const TRACK_2_ID: &str = "track-2";

/// Amount the catalog expects for `TRACK_1_ID`
pub const TRACK_1_EXPECTED: f64 = 120.0;

/// Timeout for individual HTTP requests in tests
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum time to wait for the test server to start
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness polls
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
