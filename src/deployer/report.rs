// Jetporch
// Copyright (C) 2023 - Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Per-host and summary deployment counters, rendered as a plain
//! column-aligned table.

use std::time::Duration;

/// Packing/deploy counters for a single host.
#[derive(Clone, Debug, Default)]
pub struct HostReport {
    pub host: String,
    pub instances_packed: usize,
    pub instances_deployed: usize,
    pub instances_failed: usize,
    pub instances_not_attempted: usize,
    pub duration: Duration,
}

/// The full report: one row per host plus the aggregate.
#[derive(Clone, Debug, Default)]
pub struct Report {
    pub hosts: Vec<HostReport>,
}

impl Report {
    pub fn total_packed(&self) -> usize {
        self.hosts.iter().map(|h| h.instances_packed).sum()
    }

    pub fn total_deployed(&self) -> usize {
        self.hosts.iter().map(|h| h.instances_deployed).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.hosts.iter().map(|h| h.instances_failed).sum()
    }

    pub fn total_not_attempted(&self) -> usize {
        self.hosts.iter().map(|h| h.instances_not_attempted).sum()
    }

    pub fn any_failed(&self) -> bool {
        self.total_failed() > 0
    }

    /// Render the report as an aligned plain-text table.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<24}{:>8}{:>10}{:>8}{:>14}{:>10}\n",
            "HOST", "PACKED", "DEPLOYED", "FAILED", "NOT-ATTEMPT", "TIME"
        ));
        for h in &self.hosts {
            out.push_str(&format!(
                "{:<24}{:>8}{:>10}{:>8}{:>14}{:>9.2}s\n",
                h.host,
                h.instances_packed,
                h.instances_deployed,
                h.instances_failed,
                h.instances_not_attempted,
                h.duration.as_secs_f64()
            ));
        }
        out.push_str(&format!(
            "{:<24}{:>8}{:>10}{:>8}{:>14}\n",
            "TOTAL",
            self.total_packed(),
            self.total_deployed(),
            self.total_failed(),
            self.total_not_attempted()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_across_hosts() {
        let report = Report {
            hosts: vec![
                HostReport { host: "a".into(), instances_packed: 2, instances_deployed: 2, instances_failed: 0, instances_not_attempted: 0, duration: Duration::from_secs(1) },
                HostReport { host: "b".into(), instances_packed: 1, instances_deployed: 0, instances_failed: 1, instances_not_attempted: 0, duration: Duration::from_secs(2) },
            ],
        };
        assert_eq!(report.total_packed(), 3);
        assert_eq!(report.total_deployed(), 2);
        assert_eq!(report.total_failed(), 1);
        assert!(report.any_failed());
    }

    #[test]
    fn render_includes_every_host_row() {
        let report = Report {
            hosts: vec![HostReport { host: "web1".into(), instances_packed: 1, instances_deployed: 1, ..Default::default() }],
        };
        let table = report.render();
        assert!(table.contains("web1"));
        assert!(table.contains("TOTAL"));
    }

    #[test]
    fn empty_report_has_zero_totals_and_no_failures() {
        let report = Report::default();
        assert_eq!(report.total_packed(), 0);
        assert!(!report.any_failed());
    }
}
