//! Runtime-configurable tuning parameters for collsched.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `COLLSCHED_`) or by constructing a custom `CollConfig`.

use crate::types::Tag;

/// Tuning parameters for schedule generation and execution.
#[derive(Debug, Clone)]
pub struct CollConfig {
    /// Segment size for pipelined ring broadcast. Zero sends the whole
    /// buffer as a single segment.
    pub bcast_segment_bytes: usize,

    /// Upper bound on the scratch memory one schedule may request.
    /// Generation fails with `ScratchLimitExceeded` past this point.
    pub max_scratch_bytes: usize,

    /// First tag handed out by a fresh communicator. Tag 0 is reserved.
    pub initial_tag: Tag,

    /// Number of idle progress scans `wait` performs before yielding the
    /// thread to the OS scheduler.
    pub spin_before_yield: u32,
}

impl Default for CollConfig {
    fn default() -> Self {
        Self {
            bcast_segment_bytes: 64 * 1024,      // 64 KiB
            max_scratch_bytes: 1024 * 1024 * 1024, // 1 GiB
            initial_tag: 1,
            spin_before_yield: 64,
        }
    }
}

impl CollConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `COLLSCHED_BCAST_SEGMENT_BYTES`
    /// - `COLLSCHED_MAX_SCRATCH_BYTES`
    /// - `COLLSCHED_INITIAL_TAG`
    /// - `COLLSCHED_SPIN_BEFORE_YIELD`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unparseable values
    /// are ignored.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(n) = parse_var(&lookup, "COLLSCHED_BCAST_SEGMENT_BYTES") {
            cfg.bcast_segment_bytes = n;
        }
        if let Some(n) = parse_var(&lookup, "COLLSCHED_MAX_SCRATCH_BYTES") {
            cfg.max_scratch_bytes = n;
        }
        match parse_var(&lookup, "COLLSCHED_INITIAL_TAG") {
            Some(0) => {
                tracing::warn!(var = "COLLSCHED_INITIAL_TAG", "tag 0 is reserved; keeping default");
            }
            Some(n) => cfg.initial_tag = n,
            None => {}
        }
        if let Some(n) = parse_var(&lookup, "COLLSCHED_SPIN_BEFORE_YIELD") {
            cfg.spin_before_yield = n;
        }

        cfg
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}
