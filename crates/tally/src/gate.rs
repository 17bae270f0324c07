//! Tracking gate: is telemetry allowed, and where should it go?
//!
//! Tracking is on by default. It is switched off by an opt-out flag, and a
//! separate debug flag reroutes events away from the production collector.
//! An environment flag counts as set only when its value equals `"true"`
//! ignoring case and surrounding whitespace; anything else, including
//! garbage, is treated as absent.
//!
//! The environment form re-reads variables on every call. A flag flipped
//! mid-process is observed by the very next event.

/// Resolved gate decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingFlags {
    /// Telemetry is disabled.
    pub opt_out: bool,
    /// Events go to the debug destination instead of production.
    pub debug: bool,
}

/// Decides whether telemetry is enabled and whether debug routing applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingGate {
    /// Fixed flags, decided by the host.
    Fixed(TrackingFlags),
    /// Flags read from the environment at call time.
    Env {
        /// Variable that disables tracking when `"true"`.
        opt_out_var: String,
        /// Variable that enables debug routing when `"true"`.
        debug_var: String,
        /// Flags already set by configuration; the environment can only
        /// turn flags on, never off.
        baseline: TrackingFlags,
    },
}

impl TrackingGate {
    /// Gate that always allows production tracking.
    pub const fn enabled() -> Self {
        Self::Fixed(TrackingFlags {
            opt_out: false,
            debug: false,
        })
    }

    /// Gate that always refuses tracking.
    pub const fn disabled() -> Self {
        Self::Fixed(TrackingFlags {
            opt_out: true,
            debug: false,
        })
    }

    /// Environment gate for the given variable names with no baseline.
    pub fn from_env_vars(opt_out_var: impl Into<String>, debug_var: impl Into<String>) -> Self {
        Self::Env {
            opt_out_var: opt_out_var.into(),
            debug_var: debug_var.into(),
            baseline: TrackingFlags::default(),
        }
    }

    /// Current flags, reading the process environment for `Env` gates.
    pub fn flags(&self) -> TrackingFlags {
        self.evaluate_with(|name| std::env::var(name).ok())
    }

    /// Current flags using `lookup` in place of the process environment.
    pub fn evaluate_with(&self, lookup: impl Fn(&str) -> Option<String>) -> TrackingFlags {
        match self {
            Self::Fixed(flags) => *flags,
            Self::Env {
                opt_out_var,
                debug_var,
                baseline,
            } => TrackingFlags {
                opt_out: baseline.opt_out || lookup(opt_out_var).is_some_and(|v| is_truthy(&v)),
                debug: baseline.debug || lookup(debug_var).is_some_and(|v| is_truthy(&v)),
            },
        }
    }

    /// Whether events may be sent at all.
    pub fn is_tracking_enabled(&self) -> bool {
        !self.flags().opt_out
    }

    /// Whether events should take the debug route.
    pub fn is_debug_mode(&self) -> bool {
        self.flags().debug
    }
}

/// `true` only for a case-insensitive `"true"`.
pub fn is_truthy(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
