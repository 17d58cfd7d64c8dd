// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic census, dumped on `INFO`.
//!
//! There is no runtime object walker to lean on, so the census tallies the
//! supervised population instead (listeners by state, running workers) and
//! adds process memory counters where the platform exposes them. Strictly
//! diagnostic: every failure is logged and swallowed.

use std::collections::BTreeMap;

use tracing::info;

/// One line of census output.
#[derive(Debug, PartialEq, Eq)]
pub struct CensusLine {
    pub name: String,
    pub count: i64,
    /// Change since the previous dump; equal to `count` on the first one.
    pub delta: i64,
}

#[derive(Default)]
pub struct Census {
    last: Option<BTreeMap<String, i64>>,
}

impl Census {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the tallies, biggest first, with deltas since the last dump.
    pub fn dump(&mut self, counts: BTreeMap<String, i64>) {
        for line in self.take(counts) {
            info!(count = line.count, delta = line.delta, "census {}", line.name);
        }
        if let Some((rss_kb, vm_kb)) = memory_kb() {
            info!(rss_kb, vm_kb, "census memory");
        }
    }

    /// Compute the dump lines and roll the snapshot. Top ten by count,
    /// ties broken by name.
    fn take(&mut self, counts: BTreeMap<String, i64>) -> Vec<CensusLine> {
        let previous = self.last.take().unwrap_or_default();
        let mut lines: Vec<CensusLine> = counts
            .iter()
            .map(|(name, &count)| CensusLine {
                name: name.clone(),
                count,
                delta: count - previous.get(name).copied().unwrap_or(0),
            })
            .collect();
        lines.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        lines.truncate(10);
        self.last = Some(counts);
        lines
    }
}

/// `(VmRSS, VmSize)` in kB from `/proc/self/status`; `None` off Linux or
/// on any read or parse hiccup.
fn memory_kb() -> Option<(u64, u64)> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let mut rss = None;
    let mut size = None;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            rss = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            size = parse_kb(rest);
        }
    }
    Some((rss?, size?))
}

fn parse_kb(rest: &str) -> Option<u64> {
    rest.trim().trim_end_matches("kB").trim().parse().ok()
}

#[cfg(test)]
#[path = "census_tests.rs"]
mod tests;
