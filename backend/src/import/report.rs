//! Import summary and its console rendering.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::validation::{RejectReason, RowRejection};

/// A rejected row as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub line: usize,
    pub field: String,
    pub reason: String,
    pub raw_value: String,
}

impl From<&RowRejection> for RejectedRow {
    fn from(r: &RowRejection) -> Self {
        Self {
            line: r.line,
            field: r.field.clone(),
            reason: r.message.clone(),
            raw_value: r.raw_value.clone(),
        }
    }
}

/// Counts produced by one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub skipped_duplicate_in_batch: usize,
    pub skipped_missing_parent: usize,
    pub deleted_in_reconciliation: usize,
    pub promoted_in_reconciliation: usize,
    pub rejected_rows: Vec<RejectedRow>,
    pub normalized_rows: usize,
    pub total_rows: usize,
    /// Everything above was computed but rolled back.
    pub dry_run: bool,
}

impl ImportSummary {
    pub fn rejected(&self) -> usize {
        self.rejected_rows.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Multi-line report. At most `max_rejections` rejected rows are listed.
    pub fn render(&self, max_rejections: usize) -> String {
        let mut out = String::new();
        let title = if self.dry_run {
            "Import summary (dry run, nothing written)"
        } else {
            "Import summary"
        };
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "  rows read:                 {}", self.total_rows);
        let _ = writeln!(out, "  normalized:                {}", self.normalized_rows);
        let _ = writeln!(out, "  rejected:                  {}", self.rejected());
        let _ = writeln!(out, "  inserted:                  {}", self.inserted);
        let _ = writeln!(out, "  already in store:          {}", self.skipped_existing);
        let _ = writeln!(out, "  duplicate in file:         {}", self.skipped_duplicate_in_batch);
        let _ = writeln!(out, "  unknown cooperative:       {}", self.skipped_missing_parent);
        let _ = writeln!(out, "  removed by reconciliation: {}", self.deleted_in_reconciliation);
        let _ = writeln!(out, "  promoted to primary:       {}", self.promoted_in_reconciliation);

        if !self.rejected_rows.is_empty() {
            let _ = writeln!(out, "Rejected rows:");
            for r in self.rejected_rows.iter().take(max_rejections) {
                let _ = writeln!(
                    out,
                    "  line {:>5}  {:<12} {} ('{}')",
                    r.line, r.field, r.reason, r.raw_value
                );
            }
            if self.rejected_rows.len() > max_rejections {
                let _ = writeln!(out, "  ... +{} more", self.rejected_rows.len() - max_rejections);
            }
        }
        out
    }

    pub fn print_report(&self, max_rejections: usize) {
        print!("{}", self.render(max_rejections));
    }
}

/// Rejections as a report list.
pub fn rejected_rows(rejections: &[RowRejection]) -> Vec<RejectedRow> {
    rejections.iter().map(RejectedRow::from).collect()
}

/// Count rejections per reason, most frequent first.
pub fn rejections_by_reason(rejections: &[RowRejection]) -> Vec<(RejectReason, usize)> {
    let mut counts: Vec<(RejectReason, usize)> = Vec::new();
    for r in rejections {
        match counts.iter_mut().find(|(reason, _)| *reason == r.reason) {
            Some((_, n)) => *n += 1,
            None => counts.push((r.reason, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with_rejections(n: usize) -> ImportSummary {
        ImportSummary {
            total_rows: n + 2,
            normalized_rows: 2,
            inserted: 1,
            skipped_existing: 1,
            rejected_rows: (0..n)
                .map(|i| RejectedRow {
                    line: i + 2,
                    field: "valor".into(),
                    reason: "invalid email".into(),
                    raw_value: format!("bad{i}"),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_json_field_names() {
        let json: serde_json::Value = serde_json::from_str(&summary_with_rejections(1).to_json().unwrap()).unwrap();
        for key in [
            "inserted",
            "skipped_existing",
            "skipped_duplicate_in_batch",
            "skipped_missing_parent",
            "deleted_in_reconciliation",
            "promoted_in_reconciliation",
            "rejected_rows",
            "normalized_rows",
            "total_rows",
            "dry_run",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["rejected_rows"][0]["raw_value"], "bad0");
    }

    #[test]
    fn test_render_caps_rejections() {
        let text = summary_with_rejections(5).render(2);
        assert!(text.contains("line     2"));
        assert!(text.contains("line     3"));
        assert!(!text.contains("bad4"));
        assert!(text.contains("+3 more"));
    }

    #[test]
    fn test_render_dry_run_title() {
        let summary = ImportSummary {
            dry_run: true,
            ..Default::default()
        };
        assert!(summary.render(10).contains("dry run"));
        assert!(!summary.render(10).contains("Rejected rows"));
    }

    #[test]
    fn test_rejections_by_reason() {
        let rejections = vec![
            RowRejection::new(2, "valor", "a", RejectReason::InvalidEmail),
            RowRejection::new(3, "id_singular", "x", RejectReason::InvalidIdentifier),
            RowRejection::new(4, "valor", "b", RejectReason::InvalidEmail),
        ];
        let counts = rejections_by_reason(&rejections);
        assert_eq!(counts[0], (RejectReason::InvalidEmail, 2));
        assert_eq!(counts[1], (RejectReason::InvalidIdentifier, 1));

        let rows = rejected_rows(&rejections);
        assert_eq!(rows[1].reason, "invalid identifier (expected up to 3 digits)");
    }
}
