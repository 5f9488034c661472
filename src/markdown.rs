use chrono::Local;

use crate::ResolvedItem;
use crate::resolver::{self, MatchKind};
use crate::support_db::FormatViolation;

pub fn render_report(items: &[ResolvedItem]) -> String {
    let supported = items
        .iter()
        .filter(|i| matches!(i.result.status.as_deref(), Some("1")))
        .count();
    let unsupported = items
        .iter()
        .filter(|i| matches!(i.result.status.as_deref(), Some(v) if v != "1"))
        .count();
    let unknown = items.len() - supported - unsupported;

    let mut s = String::new();
    s.push_str("# HwCompat Report\n\n");
    s.push_str(&format!("Generated: {}\n\n", Local::now().format("%Y-%m-%d %H:%M")));
    s.push_str("## Summary\n");
    s.push_str(&format!("- Devices: {}\n", items.len()));
    s.push_str(&format!("- Supported: {}\n", supported));
    s.push_str(&format!("- Unsupported: {}\n", unsupported));
    s.push_str(&format!("- Unknown: {}\n\n", unknown));

    s.push_str("## Devices\n");
    if items.is_empty() {
        s.push_str("None\n");
    }
    for it in items {
        let key = it.key.as_deref().unwrap_or("N/A");
        let label = resolver::status_label(&it.result);
        let via = match (it.result.kind, it.result.matched_key.as_deref()) {
            (MatchKind::Fuzzy, Some(mk)) | (MatchKind::Wildcard, Some(mk)) => {
                format!(" via {} [{}]", mk, it.result.kind.as_str())
            }
            _ => String::new(),
        };
        s.push_str(&format!(
            "- {} — {} — {}{} — {} — {}\n",
            it.input, key, label, via, it.result.detail, it.result.driver
        ));
    }
    s
}

pub fn render_validation(path: &str, violations: &[FormatViolation]) -> String {
    let mut s = String::new();
    s.push_str("# HwCompat Validation\n\n");
    s.push_str(&format!("Generated: {}\n\n", Local::now().format("%Y-%m-%d %H:%M")));
    s.push_str(&format!("File: {}\n", path));
    s.push_str(&format!("Violations: {}\n\n", violations.len()));
    if violations.is_empty() {
        s.push_str("Format OK\n");
        return s;
    }
    let repairable = violations.iter().filter(|v| v.kind.repairable()).count();
    s.push_str(&format!("Repairable (by deletion): {}\n\n", repairable));
    for v in violations {
        s.push_str(&format!("- line {}: {} - `{}`\n", v.line_no, v.message(), v.line));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MatchResult;

    #[test]
    fn report_counts_statuses() {
        let items = vec![
            ResolvedItem {
                input: "PCI\\VEN_1002&DEV_67DF".to_string(),
                key: Some("1002&67DF".to_string()),
                result: MatchResult {
                    status: Some("1".to_string()),
                    matched_key: Some("1002&67DF".to_string()),
                    detail: "RX 480/580".to_string(),
                    driver: "WhateverGreen".to_string(),
                    kind: MatchKind::Exact,
                },
            },
            ResolvedItem {
                input: "PCI\\VEN_10DE&DEV_2204".to_string(),
                key: Some("10DE&2204".to_string()),
                result: MatchResult::no_match(),
            },
        ];
        let md = render_report(&items);
        assert!(md.contains("- Devices: 2"));
        assert!(md.contains("- Supported: 1"));
        assert!(md.contains("- Unknown: 1"));
        assert!(md.contains("RX 480/580"));
    }

    #[test]
    fn validation_lists_line_numbers() {
        let violations = crate::support_db::validate("BADLINE\n1002&67DF=2\n");
        let md = render_validation("GPUSupportInfo.list", &violations);
        assert!(md.contains("Violations: 2"));
        assert!(md.contains("- line 1:"));
        assert!(md.contains("- line 2:"));
    }
}
