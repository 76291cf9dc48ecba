//! Risk and impact analysis over a matrix diff.
//!
//! A pure function of the diff: no I/O, recomputable at any time.

use super::{ChangeType, DiffEntry, MatrixDiff};
use crate::model::{ActionClass, MatrixEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const MEDIUM_RISK_MODIFICATIONS: usize = 5;
const MEDIUM_RISK_ADDITIONS: usize = 10;
const MANY_ZONES: usize = 3;
const MANY_MODIFICATIONS: usize = 10;

/// Overall risk level of a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Qualitative assessment derived from a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub risk_level: RiskLevel,
    pub impacted_zones: BTreeSet<String>,
    pub impacted_services: BTreeSet<String>,
    pub critical_changes: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Derive the impact analysis of a diff.
///
/// Risk precedence, first match wins: any critical change, any removal,
/// more than 5 modifications, more than 10 additions, otherwise low.
pub fn generate_impact_analysis(diff: &MatrixDiff) -> ImpactAnalysis {
    let mut impacted_zones = BTreeSet::new();
    let mut impacted_services = BTreeSet::new();
    let mut critical_changes = Vec::new();

    for diff_entry in diff.changed_entries() {
        for entry in touched_entries(diff_entry) {
            collect_values(&mut impacted_zones, [entry.src_zone.as_deref(), entry.dst_zone.as_deref()]);
            collect_values(
                &mut impacted_services,
                [entry.src_service.as_deref(), entry.dst_service.as_deref()],
            );
        }
        if let Some(message) = critical_message(diff_entry) {
            critical_changes.push(message);
        }
    }

    let summary = &diff.summary;
    let risk_level = if !critical_changes.is_empty() {
        RiskLevel::Critical
    } else if summary.removed > 0 {
        RiskLevel::High
    } else if summary.modified > MEDIUM_RISK_MODIFICATIONS
        || summary.added > MEDIUM_RISK_ADDITIONS
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let mut recommendations = Vec::new();
    if !critical_changes.is_empty() {
        recommendations.push(format!(
            "Review {} critical change(s) with the security team before deployment",
            critical_changes.len()
        ));
    }
    if summary.removed > 0 {
        recommendations.push(format!(
            "Confirm that {} removed rule(s) are no longer required by dependent applications",
            summary.removed
        ));
    }
    if impacted_zones.len() > MANY_ZONES {
        recommendations.push(format!(
            "Changes span {} zones; coordinate the rollout with each zone owner",
            impacted_zones.len()
        ));
    }
    if summary.modified > MANY_MODIFICATIONS {
        recommendations.push(format!(
            "{} rules were modified; consider a staged deployment",
            summary.modified
        ));
    }

    tracing::debug!(
        risk = %risk_level,
        critical = critical_changes.len(),
        zones = impacted_zones.len(),
        "Computed impact analysis"
    );

    ImpactAnalysis {
        risk_level,
        impacted_zones,
        impacted_services,
        critical_changes,
        recommendations,
    }
}

fn touched_entries(diff_entry: &DiffEntry) -> impl Iterator<Item = &MatrixEntry> {
    diff_entry
        .old_entry
        .iter()
        .chain(diff_entry.new_entry.iter())
}

fn collect_values<'a>(set: &mut BTreeSet<String>, values: impl IntoIterator<Item = Option<&'a str>>) {
    for value in values.into_iter().flatten() {
        if !value.is_empty() {
            set.insert(value.to_string());
        }
    }
}

fn critical_message(diff_entry: &DiffEntry) -> Option<String> {
    let label = diff_entry.entry.label();
    match diff_entry.change_type {
        ChangeType::Removed => Some(format!("Rule \"{label}\" (#{}) removed", diff_entry.id())),
        ChangeType::Added if diff_entry.entry.action_class() == ActionClass::Deny => Some(format!(
            "New deny rule \"{label}\" (#{}) added",
            diff_entry.id()
        )),
        ChangeType::Modified => diff_entry
            .changes
            .iter()
            .find(|c| c.is_allow_to_deny())
            .map(|change| {
                format!(
                    "Rule \"{label}\" (#{}) action changed from {} to {}",
                    diff_entry.id(),
                    change.old_value.as_deref().unwrap_or(""),
                    change.new_value.as_deref().unwrap_or("")
                )
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffEngine, DiffMetadata};
    use crate::model::{EntryField, MatrixSnapshot};

    fn rule(id: i64, action: &str) -> MatrixEntry {
        MatrixEntry::new(id)
            .with(EntryField::Action, action)
            .with(EntryField::RuleName, format!("R{id}"))
            .with(EntryField::SrcZone, format!("zone-{}", id % 7))
            .with(EntryField::DstService, "https")
    }

    fn diff(old: Vec<MatrixEntry>, new: Vec<MatrixEntry>) -> MatrixDiff {
        DiffEngine::new().generate_diff(
            &MatrixSnapshot::new(old),
            &MatrixSnapshot::new(new),
            DiffMetadata::versions(1, 2),
        )
    }

    #[test]
    fn test_no_changes_is_low() {
        let d = diff(vec![rule(1, "ALLOW")], vec![rule(1, "ALLOW")]);
        let impact = generate_impact_analysis(&d);
        assert_eq!(impact.risk_level, RiskLevel::Low);
        assert!(impact.impacted_zones.is_empty());
        assert!(impact.recommendations.is_empty());
    }

    #[test]
    fn test_allow_to_deny_is_critical() {
        let d = diff(vec![rule(1, "ALLOW")], vec![rule(1, "DENY")]);
        let impact = generate_impact_analysis(&d);
        assert_eq!(impact.risk_level, RiskLevel::Critical);
        assert!(impact.critical_changes[0].contains("R1"));
        assert!(impact.impacted_services.contains("https"));
    }

    #[test]
    fn test_deny_to_allow_is_not_critical() {
        let d = diff(vec![rule(1, "DENY")], vec![rule(1, "ALLOW")]);
        let impact = generate_impact_analysis(&d);
        assert_eq!(impact.risk_level, RiskLevel::Low);
        assert!(impact.critical_changes.is_empty());
    }

    #[test]
    fn test_new_deny_rule_is_critical() {
        let d = diff(vec![], vec![rule(3, "drop")]);
        assert_eq!(generate_impact_analysis(&d).risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_removal_is_critical_and_recommended() {
        let d = diff(vec![rule(1, "ALLOW")], vec![]);
        let impact = generate_impact_analysis(&d);
        assert_eq!(impact.risk_level, RiskLevel::Critical);
        assert_eq!(impact.recommendations.len(), 2);
    }

    #[test]
    fn test_many_additions_is_medium() {
        let added: Vec<_> = (1..=11).map(|id| rule(id, "ALLOW")).collect();
        let impact = generate_impact_analysis(&diff(vec![], added));
        assert_eq!(impact.risk_level, RiskLevel::Medium);
        // zones 0..=6 all touched
        assert_eq!(impact.impacted_zones.len(), 7);
        assert!(impact.recommendations.iter().any(|r| r.contains("zones")));
    }

    #[test]
    fn test_many_modifications_is_medium() {
        let old: Vec<_> = (1..=6).map(|id| rule(id, "ALLOW")).collect();
        let new: Vec<_> = (1..=6)
            .map(|id| rule(id, "ALLOW").with(EntryField::Comment, "updated"))
            .collect();
        let impact = generate_impact_analysis(&diff(old, new));
        assert_eq!(impact.risk_level, RiskLevel::Medium);
    }
}
