//! Flow entry record and its field identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One flow rule as captured in a snapshot.
///
/// The same logical rule is correlated across versions solely by `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub id: i64,
    pub request_type: Option<String>,
    pub rule_status: Option<String>,
    pub rule_name: Option<String>,
    pub device: Option<String>,
    pub src_zone: Option<String>,
    pub src_name: Option<String>,
    pub src_cidr: Option<String>,
    pub src_service: Option<String>,
    pub dst_zone: Option<String>,
    pub dst_name: Option<String>,
    pub dst_cidr: Option<String>,
    pub dst_service: Option<String>,
    pub protocol_group: Option<String>,
    pub action: Option<String>,
    pub implementation_date: Option<String>,
    pub requester: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MatrixEntry {
    /// Create an entry with only an id set.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Builder-style setter for a single attribute.
    #[must_use]
    pub fn with(mut self, field: EntryField, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Read an attribute by field identifier.
    #[must_use]
    pub fn get(&self, field: EntryField) -> Option<&str> {
        match field {
            EntryField::RequestType => self.request_type.as_deref(),
            EntryField::RuleStatus => self.rule_status.as_deref(),
            EntryField::RuleName => self.rule_name.as_deref(),
            EntryField::Device => self.device.as_deref(),
            EntryField::SrcZone => self.src_zone.as_deref(),
            EntryField::SrcName => self.src_name.as_deref(),
            EntryField::SrcCidr => self.src_cidr.as_deref(),
            EntryField::SrcService => self.src_service.as_deref(),
            EntryField::DstZone => self.dst_zone.as_deref(),
            EntryField::DstName => self.dst_name.as_deref(),
            EntryField::DstCidr => self.dst_cidr.as_deref(),
            EntryField::DstService => self.dst_service.as_deref(),
            EntryField::ProtocolGroup => self.protocol_group.as_deref(),
            EntryField::Action => self.action.as_deref(),
            EntryField::ImplementationDate => self.implementation_date.as_deref(),
            EntryField::Requester => self.requester.as_deref(),
            EntryField::Comment => self.comment.as_deref(),
        }
    }

    /// Overwrite an attribute by field identifier.
    pub fn set(&mut self, field: EntryField, value: Option<String>) {
        let slot = match field {
            EntryField::RequestType => &mut self.request_type,
            EntryField::RuleStatus => &mut self.rule_status,
            EntryField::RuleName => &mut self.rule_name,
            EntryField::Device => &mut self.device,
            EntryField::SrcZone => &mut self.src_zone,
            EntryField::SrcName => &mut self.src_name,
            EntryField::SrcCidr => &mut self.src_cidr,
            EntryField::SrcService => &mut self.src_service,
            EntryField::DstZone => &mut self.dst_zone,
            EntryField::DstName => &mut self.dst_name,
            EntryField::DstCidr => &mut self.dst_cidr,
            EntryField::DstService => &mut self.dst_service,
            EntryField::ProtocolGroup => &mut self.protocol_group,
            EntryField::Action => &mut self.action,
            EntryField::ImplementationDate => &mut self.implementation_date,
            EntryField::Requester => &mut self.requester,
            EntryField::Comment => &mut self.comment,
        };
        *slot = value;
    }

    /// Return a copy with empty strings coerced to `None`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut entry = self.clone();
        for field in EntryField::ALL {
            if entry.get(field).is_some_and(str::is_empty) {
                entry.set(field, None);
            }
        }
        entry
    }

    /// Classification of this entry's action.
    #[must_use]
    pub fn action_class(&self) -> ActionClass {
        ActionClass::of(self.action.as_deref())
    }

    /// Short label used in reports: rule name, or `#id` when unnamed.
    #[must_use]
    pub fn label(&self) -> String {
        match self.rule_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("#{}", self.id),
        }
    }
}

/// Identifier for every comparable attribute of a [`MatrixEntry`].
///
/// `id` and timestamps are deliberately absent: they never count as changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    RequestType,
    RuleStatus,
    RuleName,
    Device,
    SrcZone,
    SrcName,
    SrcCidr,
    SrcService,
    DstZone,
    DstName,
    DstCidr,
    DstService,
    ProtocolGroup,
    Action,
    ImplementationDate,
    Requester,
    Comment,
}

impl EntryField {
    /// All comparable fields in diff order.
    pub const ALL: [Self; 17] = [
        Self::RequestType,
        Self::RuleStatus,
        Self::RuleName,
        Self::Device,
        Self::SrcZone,
        Self::SrcName,
        Self::SrcCidr,
        Self::SrcService,
        Self::DstZone,
        Self::DstName,
        Self::DstCidr,
        Self::DstService,
        Self::ProtocolGroup,
        Self::Action,
        Self::ImplementationDate,
        Self::Requester,
        Self::Comment,
    ];

    /// Serialized field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestType => "request_type",
            Self::RuleStatus => "rule_status",
            Self::RuleName => "rule_name",
            Self::Device => "device",
            Self::SrcZone => "src_zone",
            Self::SrcName => "src_name",
            Self::SrcCidr => "src_cidr",
            Self::SrcService => "src_service",
            Self::DstZone => "dst_zone",
            Self::DstName => "dst_name",
            Self::DstCidr => "dst_cidr",
            Self::DstService => "dst_service",
            Self::ProtocolGroup => "protocol_group",
            Self::Action => "action",
            Self::ImplementationDate => "implementation_date",
            Self::Requester => "requester",
            Self::Comment => "comment",
        }
    }

    /// Parse a serialized field name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a rule action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Allow,
    Deny,
    Other,
}

impl ActionClass {
    const ALLOW: [&'static str; 4] = ["allow", "accept", "permit", "pass"];
    const DENY: [&'static str; 4] = ["deny", "drop", "reject", "block"];

    /// Classify an action value, case-insensitively.
    #[must_use]
    pub fn of(action: Option<&str>) -> Self {
        let Some(action) = action else {
            return Self::Other;
        };
        let lowered = action.trim().to_lowercase();
        if Self::ALLOW.contains(&lowered.as_str()) {
            Self::Allow
        } else if Self::DENY.contains(&lowered.as_str()) {
            Self::Deny
        } else {
            Self::Other
        }
    }

    /// Whether moving from `old` to `new` turns an allow rule into a deny rule.
    #[must_use]
    pub fn is_allow_to_deny(old: Option<&str>, new: Option<&str>) -> bool {
        Self::of(old) == Self::Allow && Self::of(new) == Self::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_roundtrip_every_field() {
        let mut entry = MatrixEntry::new(1);
        for field in EntryField::ALL {
            entry.set(field, Some(field.as_str().to_uppercase()));
        }
        for field in EntryField::ALL {
            assert_eq!(entry.get(field), Some(field.as_str().to_uppercase().as_str()));
        }
    }

    #[test]
    fn test_field_names_roundtrip() {
        for field in EntryField::ALL {
            assert_eq!(EntryField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(EntryField::from_name("id"), None);
    }

    #[test]
    fn test_field_serde_name_matches_as_str() {
        let json = serde_json::to_string(&EntryField::SrcCidr).expect("serialize");
        assert_eq!(json, "\"src_cidr\"");
    }

    #[test]
    fn test_action_class() {
        assert_eq!(ActionClass::of(Some("ALLOW")), ActionClass::Allow);
        assert_eq!(ActionClass::of(Some(" Permit ")), ActionClass::Allow);
        assert_eq!(ActionClass::of(Some("drop")), ActionClass::Deny);
        assert_eq!(ActionClass::of(Some("log")), ActionClass::Other);
        assert_eq!(ActionClass::of(None), ActionClass::Other);
        assert!(ActionClass::is_allow_to_deny(Some("ALLOW"), Some("DENY")));
        assert!(!ActionClass::is_allow_to_deny(Some("DENY"), Some("ALLOW")));
    }

    #[test]
    fn test_normalized_clears_empty_strings() {
        let entry = MatrixEntry::new(3)
            .with(EntryField::Comment, "")
            .with(EntryField::RuleName, "R3");
        let normalized = entry.normalized();
        assert_eq!(normalized.comment, None);
        assert_eq!(normalized.rule_name.as_deref(), Some("R3"));
    }

    #[test]
    fn test_label_falls_back_to_id() {
        assert_eq!(MatrixEntry::new(9).label(), "#9");
        assert_eq!(MatrixEntry::new(9).with(EntryField::RuleName, "web").label(), "web");
    }
}
