//! Line-set delta between two rulesets.
//!
//! A coarse semantic-change indicator, not a minimal edit script: lines only
//! in the live ruleset come out prefixed `-`, lines only in the proposed one
//! prefixed `+`. Comparison is over trimmed non-empty lines, duplicates
//! collapsed, each group in first-appearance order.

use std::collections::HashSet;

pub fn ruleset_delta(current: &str, proposed: &str) -> String {
    let (current_ordered, current_set) = line_set(current);
    let (proposed_ordered, proposed_set) = line_set(proposed);

    let mut out = String::new();
    for line in &current_ordered {
        if !proposed_set.contains(line) {
            out.push_str("- ");
            out.push_str(line);
            out.push('\n');
        }
    }
    for line in &proposed_ordered {
        if !current_set.contains(line) {
            out.push_str("+ ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Trimmed non-empty lines in first-appearance order, deduplicated.
fn line_set(text: &str) -> (Vec<String>, HashSet<String>) {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_string()) {
            ordered.push(trimmed.to_string());
        }
    }
    (ordered, seen)
}
