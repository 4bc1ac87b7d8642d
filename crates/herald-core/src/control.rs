//! Control-plane vocabulary between supervisor and worker.
//!
//! The worker's stdout carries one signal per line; the supervisor answers an
//! uptime query with a single seconds value on the worker's stdin.

use std::fmt;

/// A signal the worker may send upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    /// Worker requests a coordinated teardown + relaunch.
    Reset,
    /// Worker asks how long the supervisor has been running.
    UptimeQuery,
}

impl ControlSignal {
    /// Parse one control line. Unknown values are not an error; the caller
    /// logs and ignores them.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "reset" => Some(Self::Reset),
            "uptime" => Some(Self::UptimeQuery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::UptimeQuery => "uptime",
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exactly_the_two_literals() {
        assert_eq!(ControlSignal::parse("reset"), Some(ControlSignal::Reset));
        assert_eq!(ControlSignal::parse("uptime"), Some(ControlSignal::UptimeQuery));
        assert_eq!(ControlSignal::parse("  uptime \n"), Some(ControlSignal::UptimeQuery));

        assert_eq!(ControlSignal::parse("RESET"), None);
        assert_eq!(ControlSignal::parse("restart"), None);
        assert_eq!(ControlSignal::parse(""), None);
        assert_eq!(ControlSignal::parse("uptime please"), None);
    }

    #[test]
    fn display_round_trips() {
        for sig in [ControlSignal::Reset, ControlSignal::UptimeQuery] {
            assert_eq!(ControlSignal::parse(sig.as_str()), Some(sig));
        }
    }
}
