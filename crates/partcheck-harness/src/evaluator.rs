//! Outcome evaluation: turns a counter snapshot into a PASS/FAIL report.
//!
//! All percentages are integer percentages with truncating division, the
//! same arithmetic the report prints.

use std::fmt;

use serde::Serialize;

use partcheck_core::config::{BandConfig, PartcheckConfig};

use crate::stats::{CounterSnapshot, RxPath};

/// Closed interval `[target - epsilon, target + epsilon]` of percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToleranceBand {
    pub target: u64,
    pub epsilon: u64,
}

impl ToleranceBand {
    pub const fn new(target: u64, epsilon: u64) -> Self {
        Self { target, epsilon }
    }

    pub fn low(&self) -> u64 {
        self.target.saturating_sub(self.epsilon)
    }

    pub fn high(&self) -> u64 {
        self.target.saturating_add(self.epsilon)
    }

    pub fn contains(&self, percent: u64) -> bool {
        (self.low()..=self.high()).contains(&percent)
    }
}

impl From<BandConfig> for ToleranceBand {
    fn from(b: BandConfig) -> Self {
        Self::new(b.target, b.epsilon)
    }
}

impl fmt::Display for ToleranceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}%, {}%]", self.low(), self.high())
    }
}

/// Everything a run must satisfy to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassCriteria {
    /// Indexed by `RxPath::index`.
    pub bands: [ToleranceBand; 2],
    /// Delivery percentage must be strictly greater than this.
    pub passed_limit: u64,
}

impl PassCriteria {
    pub fn from_config(cfg: &PartcheckConfig) -> Self {
        Self {
            bands: [cfg.bands.path0.into(), cfg.bands.path1.into()],
            passed_limit: cfg.run.passed_limit,
        }
    }

    pub fn band(&self, path: RxPath) -> ToleranceBand {
        self.bands[path.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASSED"),
            Verdict::Fail => f.write_str("FAILED"),
        }
    }
}

/// One reason a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shortfall {
    OutOfBand {
        path: RxPath,
        percent: u64,
        band: ToleranceBand,
    },
    DeliveryAtOrBelowLimit {
        delivery: u64,
        limit: u64,
    },
    NothingSent,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::OutOfBand {
                path,
                percent,
                band,
            } => write!(f, "port {path} received {percent}%, outside {band}"),
            Shortfall::DeliveryAtOrBelowLimit { delivery, limit } => {
                write!(f, "delivered {delivery}% of sent, needs more than {limit}%")
            }
            Shortfall::NothingSent => f.write_str("generator sent nothing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub counters: CounterSnapshot,
    /// Valid arrivals across both paths.
    pub received: u64,
    /// Share of valid arrivals per path, indexed by `RxPath::index`.
    pub percent: [u64; 2],
    /// Valid arrivals as a percentage of packets sent.
    pub delivery: u64,
    pub criteria: PassCriteria,
    pub shortfalls: Vec<Shortfall>,
    pub verdict: Verdict,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sent {} packets", self.counters.sent)?;
        writeln!(f, "Received {} packets", self.received)?;
        for path in RxPath::ALL {
            writeln!(
                f,
                "Proportion of packets received on {path} port {}%",
                self.percent[path.index()]
            )?;
        }
        writeln!(f, "Broken = {} packets", self.counters.broken)?;
        if self.counters.foreign > 0 {
            writeln!(f, "Skipped = {} unparseable packets", self.counters.foreign)?;
        }
        for s in &self.shortfalls {
            writeln!(f, "  {s}")?;
        }
        writeln!(f, "TEST {}", self.verdict)
    }
}

/// `part * 100 / whole`, truncated; zero when `whole` is zero and
/// `u64::MAX` when the result does not fit.
pub fn percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    u64::try_from(u128::from(part) * 100 / u128::from(whole)).unwrap_or(u64::MAX)
}

/// Apply the pass criteria to one snapshot.
pub fn evaluate(counters: CounterSnapshot, criteria: &PassCriteria) -> Report {
    let received = counters.received();
    let percent_on = |path| percent(counters.on(path), received);
    let shares = [percent_on(RxPath::Path0), percent_on(RxPath::Path1)];
    let delivery = percent(received, counters.sent);

    let mut shortfalls = Vec::new();
    for path in RxPath::ALL {
        let band = criteria.band(path);
        let p = shares[path.index()];
        if !band.contains(p) {
            shortfalls.push(Shortfall::OutOfBand {
                path,
                percent: p,
                band,
            });
        }
    }
    if counters.sent == 0 {
        shortfalls.push(Shortfall::NothingSent);
    } else if delivery <= criteria.passed_limit {
        shortfalls.push(Shortfall::DeliveryAtOrBelowLimit {
            delivery,
            limit: criteria.passed_limit,
        });
    }

    let verdict = if shortfalls.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    Report {
        counters,
        received,
        percent: shares,
        delivery,
        criteria: *criteria,
        shortfalls,
        verdict,
    }
}
