//! DFW rule-section models and their XML wire mapping.
//!
//! Field order and element names follow the NSX `section` schema. Optional
//! rule filters (`sources`, `destinations`, `services`) are `None` when the
//! element is absent, which means "any"; `Some` with an empty list is kept
//! distinct and re-encoded as an empty element.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vcd_core::xml::{from_xml_str, to_xml_document};
use vcd_core::Error;

use crate::Result;

/// Well-known `type` values for [`AppliedToEntry`].
pub mod entry_type {
    /// Organization VDC
    pub const VDC: &str = "VDC";
    /// Virtual machine
    pub const VIRTUAL_MACHINE: &str = "VirtualMachine";
    /// Logical switch / network
    pub const NETWORK: &str = "Network";
    /// Security group
    pub const SECURITY_GROUP: &str = "SecurityGroup";
    /// Edge gateway
    pub const EDGE: &str = "Edge";
    /// IPv4 address, range or CIDR
    pub const IPV4_ADDRESS: &str = "Ipv4Address";
    /// Service (protocol/port definition)
    pub const APPLICATION: &str = "Application";
}

/// The DFW configuration unit for one VDC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "section")]
pub struct RuleSection {
    /// Section id.
    #[serde(rename = "@id", default)]
    pub id: i64,
    /// Section name.
    #[serde(rename = "@name", default)]
    pub name: String,
    /// Generation (version) marker maintained by the backend.
    #[serde(rename = "@generationNumber", default)]
    pub generation_number: String,
    /// Last modification time, epoch milliseconds.
    #[serde(rename = "@timestamp", default)]
    pub timestamp: String,
    /// Strict TCP state tracking.
    #[serde(rename = "@tcpStrict", default)]
    pub tcp_strict: bool,
    /// Stateless operation.
    #[serde(rename = "@stateless", default)]
    pub stateless: bool,
    /// Session-id based matching.
    #[serde(rename = "@useSid", default)]
    pub use_sid: bool,
    /// Section type tag (e.g. `LAYER3`).
    #[serde(rename = "@type", default)]
    pub section_type: String,
    /// Rules in evaluation order.
    #[serde(rename = "rule", default)]
    pub rules: Vec<Rule>,
}

impl RuleSection {
    /// Decode a section from an XML document.
    pub fn from_xml(document: &str) -> Result<Self> {
        from_xml_str(document)
    }

    /// Encode the section as an XML document, declaration included.
    pub fn to_xml(&self) -> Result<String> {
        to_xml_document(self)
    }

    /// Append a rule, pointing its `sectionId` at this section.
    pub fn push_rule(&mut self, mut rule: Rule) {
        rule.section_id = self.id;
        self.rules.push(rule);
    }

    /// Parse [`timestamp`](Self::timestamp) as epoch milliseconds.
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        let millis = self.timestamp.trim().parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Check the structural invariants of the section.
    ///
    /// Every rule must reference this section's id, and a wildcard deny rule
    /// (no sources, no destinations) may only appear last.
    pub fn validate(&self) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.section_id != self.id {
                return Err(Error::ValidationError(format!(
                    "rule {} at position {index} references section {} instead of {}",
                    rule.id, rule.section_id, self.id
                )));
            }

            let is_last = index + 1 == self.rules.len();
            if rule.is_wildcard() && rule.action == RuleAction::Deny && !is_last {
                return Err(Error::ValidationError(format!(
                    "wildcard deny rule {} at position {index} shadows the rules after it",
                    rule.id
                )));
            }
        }

        Ok(())
    }
}

/// Rule action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Permit matching traffic.
    #[default]
    Allow,
    /// Drop matching traffic.
    Deny,
}

impl RuleAction {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One firewall rule within a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "rule")]
pub struct Rule {
    /// Rule id.
    #[serde(rename = "@id", default)]
    pub id: i64,
    /// Whether the rule is disabled.
    #[serde(rename = "@disabled", default)]
    pub disabled: bool,
    /// Whether matches are logged.
    #[serde(rename = "@logged", default)]
    pub logged: bool,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Allow or deny.
    pub action: RuleAction,
    /// Targets the rule is enforced on.
    #[serde(rename = "appliedToList", default)]
    pub applied_to_list: AppliedToList,
    /// Source filter; `None` means any source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Sources>,
    /// Destination filter; `None` means any destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Destinations>,
    /// Service filter; `None` means any service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Services>,
    /// Id of the owning section.
    #[serde(rename = "sectionId", default)]
    pub section_id: i64,
    /// Traffic direction (`in`, `out`, `inout`).
    #[serde(default)]
    pub direction: String,
    /// Packet type filter (`any`, `ipv4`, `ipv6`).
    #[serde(rename = "packetType", default)]
    pub packet_type: String,
    /// Opaque tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Rule {
    /// Create a rule matching any traffic in both directions.
    #[must_use]
    pub fn new(name: impl Into<String>, action: RuleAction) -> Self {
        Self {
            name: Some(name.into()),
            action,
            direction: "inout".to_string(),
            packet_type: "any".to_string(),
            ..Self::default()
        }
    }

    /// Add an applied-to target.
    #[must_use]
    pub fn applied_to(mut self, entry: AppliedToEntry) -> Self {
        self.applied_to_list.entries.push(entry);
        self
    }

    /// Set the source filter.
    #[must_use]
    pub fn with_sources(mut self, sources: Sources) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Set the destination filter.
    #[must_use]
    pub fn with_destinations(mut self, destinations: Destinations) -> Self {
        self.destinations = Some(destinations);
        self
    }

    /// Set the service filter.
    #[must_use]
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    /// A rule with neither sources nor destinations matches all endpoints.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.sources.is_none() && self.destinations.is_none()
    }
}

/// Generic reference used for applied-to targets, sources, destinations and
/// services alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedToEntry {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Referenced object id, address, or service id.
    #[serde(default)]
    pub value: String,
    /// Kind of the referenced object, see [`entry_type`].
    #[serde(rename = "type", default)]
    pub entry_type: String,
    /// Backend validity flag.
    #[serde(rename = "isValid", default, skip_serializing_if = "is_false")]
    pub is_valid: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl AppliedToEntry {
    /// Create an entry for `value` of kind `entry_type`.
    #[must_use]
    pub fn new(value: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Self {
            name: None,
            value: value.into(),
            entry_type: entry_type.into(),
            is_valid: false,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the entry valid.
    #[must_use]
    pub const fn valid(mut self) -> Self {
        self.is_valid = true;
        self
    }

    /// Organization VDC target.
    #[must_use]
    pub fn vdc(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::VDC)
    }

    /// Virtual machine target.
    #[must_use]
    pub fn virtual_machine(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::VIRTUAL_MACHINE)
    }

    /// Network target.
    #[must_use]
    pub fn network(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::NETWORK)
    }

    /// Security group target.
    #[must_use]
    pub fn security_group(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::SECURITY_GROUP)
    }

    /// Edge gateway target.
    #[must_use]
    pub fn edge(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::EDGE)
    }

    /// IPv4 address, range or CIDR.
    #[must_use]
    pub fn ipv4_address(address: impl Into<String>) -> Self {
        Self::new(address, entry_type::IPV4_ADDRESS)
    }

    /// Service definition.
    #[must_use]
    pub fn application(id: impl Into<String>) -> Self {
        Self::new(id, entry_type::APPLICATION)
    }
}

/// Ordered list of targets a rule is enforced on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedToList {
    /// Entries.
    #[serde(rename = "appliedTo", default)]
    pub entries: Vec<AppliedToEntry>,
}

/// Source filter of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
    /// When true the entries are negated.
    #[serde(rename = "@excluded", default)]
    pub excluded: bool,
    /// Entries.
    #[serde(rename = "source", default)]
    pub entries: Vec<AppliedToEntry>,
}

impl Sources {
    /// Match the given entries.
    #[must_use]
    pub fn new(entries: Vec<AppliedToEntry>) -> Self {
        Self {
            excluded: false,
            entries,
        }
    }

    /// Match everything except the given entries.
    #[must_use]
    pub fn excluding(entries: Vec<AppliedToEntry>) -> Self {
        Self {
            excluded: true,
            entries,
        }
    }
}

/// Destination filter of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destinations {
    /// When true the entries are negated.
    #[serde(rename = "@excluded", default)]
    pub excluded: bool,
    /// Entries.
    #[serde(rename = "destination", default)]
    pub entries: Vec<AppliedToEntry>,
}

impl Destinations {
    /// Match the given entries.
    #[must_use]
    pub fn new(entries: Vec<AppliedToEntry>) -> Self {
        Self {
            excluded: false,
            entries,
        }
    }

    /// Match everything except the given entries.
    #[must_use]
    pub fn excluding(entries: Vec<AppliedToEntry>) -> Self {
        Self {
            excluded: true,
            entries,
        }
    }
}

/// Service filter of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Services {
    /// Entries.
    #[serde(rename = "service", default)]
    pub entries: Vec<AppliedToEntry>,
}

impl Services {
    /// Match the given services.
    #[must_use]
    pub fn new(entries: Vec<AppliedToEntry>) -> Self {
        Self { entries }
    }
}

/// Opaque ETag presented in `If-Match` on conditional writes.
///
/// The empty token is the unconditional sentinel: the backend accepts the
/// write without a version check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    /// Wrap an ETag value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The empty, unconditional token.
    #[must_use]
    pub const fn unconditional() -> Self {
        Self(String::new())
    }

    /// Whether this is the unconditional sentinel.
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConcurrencyToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConcurrencyToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
