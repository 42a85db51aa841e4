//! Apply summary

use owo_colors::OwoColorize;
use rcm_engine::ApplyReport;

/// Counts of one apply pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// Files materialised (or that would be, in a dry run)
    pub updated: usize,
    /// Files already up to date
    pub unchanged: usize,
    /// Files filtered out by platform or condition
    pub skipped: usize,
    /// Files that failed
    pub failed: usize,
}

impl ApplyStats {
    /// Count the entries of `report`
    pub fn from_report(report: &ApplyReport) -> Self {
        Self {
            updated: report.updated.len(),
            unchanged: report.unchanged.len(),
            skipped: report.skipped.len(),
            failed: report.failures.len(),
        }
    }

    /// Number of managed files seen
    pub fn total(&self) -> usize {
        self.updated + self.unchanged + self.skipped + self.failed
    }

    /// Plain-text summary line
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would update" } else { "updated" };
        let mut parts = vec![
            format!("{} {verb}", self.updated),
            format!("{} unchanged", self.unchanged),
        ];
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        parts.join(", ")
    }

    /// Print the coloured summary line to stdout
    pub fn print_summary(&self, dry_run: bool) {
        let bullet = if self.failed > 0 {
            "●".bright_red().to_string()
        } else if dry_run {
            "●".bright_white().to_string()
        } else {
            "●".bright_green().to_string()
        };

        println!("{} {}", bullet, self.summary(dry_run).bold());
    }
}

/// Print each failed file with its error
pub fn print_failures(report: &ApplyReport) {
    for failure in &report.failures {
        eprintln!(
            "  {} {}: {}",
            "✗".bright_red(),
            failure.template.bright_white(),
            failure.error.to_string().dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_omits_zero_skips_and_failures() {
        let stats = ApplyStats {
            updated: 2,
            unchanged: 3,
            ..ApplyStats::default()
        };
        assert_eq!(stats.summary(false), "2 updated, 3 unchanged");
        assert_eq!(stats.total(), 5);
    }

    #[test]
    fn test_dry_run_wording() {
        let stats = ApplyStats {
            updated: 1,
            skipped: 1,
            failed: 1,
            ..ApplyStats::default()
        };
        assert_eq!(
            stats.summary(true),
            "1 would update, 0 unchanged, 1 skipped, 1 failed"
        );
    }

    #[test]
    fn test_from_empty_report() {
        let stats = ApplyStats::from_report(&ApplyReport::default());
        assert_eq!(stats, ApplyStats::default());
    }
}
