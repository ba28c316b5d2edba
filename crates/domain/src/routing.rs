//! Routing keys and subscription patterns.
//!
//! Every event carries a hierarchical, dot-separated routing key naming its
//! subject (`device.kitchen_light.state`). Subscriptions match keys against
//! patterns where `*` consumes exactly one segment and `#` — only valid as
//! the final token — consumes all remaining segments, including none.
//!
//! The namespace in use across the hub:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `device.{id}.state` | device state update |
//! | `device.{id}.command` | command addressed to a device |
//! | `device.{id}.available` | device availability change |
//! | `device.discovery.{id}` | a newly discovered device |
//! | `plugin.{id}.status` | plugin lifecycle transition |
//! | `automation.{rule_id}.trigger` | automation rule fired |
//! | `system.{event_type}` | hub-level event |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidPatternError;
use crate::id::{DeviceId, PluginId};

/// Canonical segment separator.
pub const SEPARATOR: char = '.';

/// A validated, dot-separated routing key.
///
/// Invariant: at least one segment, and every segment is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Parse a routing key, rejecting empty segments.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPatternError::EmptySegment`] when the key is empty
    /// or contains an empty segment (`a..b`, leading/trailing dot).
    pub fn parse(key: impl Into<String>) -> Result<Self, InvalidPatternError> {
        let key = key.into();
        if key.is_empty() || key.split(SEPARATOR).any(str::is_empty) {
            return Err(InvalidPatternError::EmptySegment { pattern: key });
        }
        Ok(Self(key))
    }

    /// `device.{id}.state`
    #[must_use]
    pub fn device_state(device_id: &DeviceId) -> Self {
        Self(format!("device.{device_id}.state"))
    }

    /// `device.{id}.command`
    #[must_use]
    pub fn device_command(device_id: &DeviceId) -> Self {
        Self(format!("device.{device_id}.command"))
    }

    /// `device.{id}.available`
    #[must_use]
    pub fn device_available(device_id: &DeviceId) -> Self {
        Self(format!("device.{device_id}.available"))
    }

    /// `device.discovery.{id}`
    #[must_use]
    pub fn device_discovery(device_id: &DeviceId) -> Self {
        Self(format!("device.discovery.{device_id}"))
    }

    /// `device.{id}.error`
    #[must_use]
    pub fn device_error(device_id: &DeviceId) -> Self {
        Self(format!("device.{device_id}.error"))
    }

    /// `plugin.{id}.status`
    #[must_use]
    pub fn plugin_status(plugin_id: &PluginId) -> Self {
        Self(format!("plugin.{plugin_id}.status"))
    }

    /// `system.{event_type}`
    #[must_use]
    pub fn system(event_type: &str) -> Self {
        Self(format!("system.{event_type}"))
    }

    /// Iterate over the key's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoutingKey {
    type Err = InvalidPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = InvalidPatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoutingKey> for String {
    fn from(value: RoutingKey) -> Self {
        value.0
    }
}

/// One compiled pattern token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Must equal the corresponding key segment exactly.
    Literal(String),
    /// `*` — consumes exactly one arbitrary segment.
    AnyOne,
    /// `#` — terminal, consumes all remaining segments (including none).
    Rest,
}

/// A compiled subscription pattern.
///
/// Compilation enforces the single-trailing-`#` restriction, which makes
/// matching a deterministic left-to-right walk with no backtracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPatternError::EmptySegment`] for empty segments and
    /// [`InvalidPatternError::NonTerminalHash`] when `#` appears anywhere
    /// but the final token.
    pub fn compile(pattern: impl Into<String>) -> Result<Self, InvalidPatternError> {
        let raw = pattern.into();
        if raw.is_empty() {
            return Err(InvalidPatternError::EmptySegment { pattern: raw });
        }

        let tokens: Vec<&str> = raw.split(SEPARATOR).collect();
        let last = tokens.len() - 1;
        let mut segments = Vec::with_capacity(tokens.len());

        for (idx, token) in tokens.iter().enumerate() {
            match *token {
                "" => {
                    return Err(InvalidPatternError::EmptySegment { pattern: raw });
                }
                "#" if idx < last => {
                    return Err(InvalidPatternError::NonTerminalHash { pattern: raw });
                }
                "#" => segments.push(Segment::Rest),
                "*" => segments.push(Segment::AnyOne),
                literal => segments.push(Segment::Literal(literal.to_string())),
            }
        }

        Ok(Self { raw, segments })
    }

    /// The catch-all pattern (`#`) matching every routing key.
    #[must_use]
    pub fn catch_all() -> Self {
        Self {
            raw: "#".to_string(),
            segments: vec![Segment::Rest],
        }
    }

    /// Whether `key` matches this pattern.
    ///
    /// Walks both segment lists left to right. Running out of pattern before
    /// the key is exhausted (without a trailing `#`), or out of key before
    /// the pattern, is a non-match.
    #[must_use]
    pub fn matches(&self, key: &RoutingKey) -> bool {
        let mut key_segments = key.segments();

        for segment in &self.segments {
            match segment {
                // Terminal by construction: everything left matches.
                Segment::Rest => return true,
                Segment::AnyOne => {
                    if key_segments.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(literal) => {
                    if key_segments.next() != Some(literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        key_segments.next().is_none()
    }

    /// The original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Pattern {
    type Err = InvalidPatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> RoutingKey {
        RoutingKey::parse(s).unwrap()
    }

    #[test]
    fn should_match_literal_pattern_exactly() {
        let pattern = Pattern::compile("device.light1.state").unwrap();
        assert!(pattern.matches(&key("device.light1.state")));
        assert!(!pattern.matches(&key("device.light2.state")));
        assert!(!pattern.matches(&key("device.light1")));
        assert!(!pattern.matches(&key("device.light1.state.extra")));
    }

    #[test]
    fn should_match_star_as_exactly_one_segment() {
        let pattern = Pattern::compile("device.*.state").unwrap();
        assert!(pattern.matches(&key("device.light1.state")));
        assert!(!pattern.matches(&key("device.light1.brightness.state")));
        assert!(!pattern.matches(&key("device.state")));
    }

    #[test]
    fn should_not_let_star_span_segments() {
        let pattern = Pattern::compile("a.*.c").unwrap();
        assert!(pattern.matches(&key("a.b.c")));
        assert!(!pattern.matches(&key("a.b.b.c")));
    }

    #[test]
    fn should_match_hash_as_zero_or_more_trailing_segments() {
        let pattern = Pattern::compile("device.#").unwrap();
        assert!(pattern.matches(&key("device.light1.state")));
        assert!(pattern.matches(&key("device.light1.brightness.state")));
        assert!(pattern.matches(&key("device")));
        assert!(!pattern.matches(&key("plugin.virtual.status")));
    }

    #[test]
    fn should_match_everything_with_catch_all() {
        let pattern = Pattern::catch_all();
        assert!(pattern.matches(&key("device.light1.state")));
        assert!(pattern.matches(&key("system.start")));
        assert!(pattern.matches(&key("a")));
    }

    #[test]
    fn should_reject_non_terminal_hash() {
        let result = Pattern::compile("a.#.b");
        assert!(matches!(
            result,
            Err(InvalidPatternError::NonTerminalHash { .. })
        ));
    }

    #[test]
    fn should_reject_empty_pattern_segments() {
        assert!(matches!(
            Pattern::compile("a..b"),
            Err(InvalidPatternError::EmptySegment { .. })
        ));
        assert!(matches!(
            Pattern::compile(""),
            Err(InvalidPatternError::EmptySegment { .. })
        ));
        assert!(matches!(
            Pattern::compile(".a"),
            Err(InvalidPatternError::EmptySegment { .. })
        ));
    }

    #[test]
    fn should_reject_empty_routing_key_segments() {
        assert!(RoutingKey::parse("a..b").is_err());
        assert!(RoutingKey::parse("").is_err());
        assert!(RoutingKey::parse("a.b.").is_err());
    }

    #[test]
    fn should_treat_star_inside_literal_as_literal() {
        let pattern = Pattern::compile("device.a*b.state").unwrap();
        assert!(pattern.matches(&key("device.a*b.state")));
        assert!(!pattern.matches(&key("device.anything.state")));
    }

    #[test]
    fn should_build_namespace_keys() {
        let device = DeviceId::new("kitchen_light");
        assert_eq!(
            RoutingKey::device_state(&device).as_str(),
            "device.kitchen_light.state"
        );
        assert_eq!(
            RoutingKey::device_discovery(&device).as_str(),
            "device.discovery.kitchen_light"
        );
        assert_eq!(
            RoutingKey::plugin_status(&PluginId::new("virtual")).as_str(),
            "plugin.virtual.status"
        );
        assert_eq!(RoutingKey::system("start").as_str(), "system.start");
    }

    #[test]
    fn should_roundtrip_routing_key_through_serde() {
        let k = key("device.light1.state");
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"device.light1.state\"");
        let parsed: RoutingKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, k);
    }

    #[test]
    fn should_reject_invalid_routing_key_during_deserialization() {
        let result: Result<RoutingKey, _> = serde_json::from_str("\"a..b\"");
        assert!(result.is_err());
    }
}
