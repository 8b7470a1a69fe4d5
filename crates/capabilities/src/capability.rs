//! The side-capability allow-list for agent-generated work.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::{Error, Result};

/// A side capability the agent is allowed to lean on when working with
/// tool output. This is a declared allow-list, not an execution sandbox:
/// the names are advertised to the model and unknown names are rejected at
/// configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Structured-data (JSON) parsing.
    Json,
    /// Syntax-tree inspection.
    Ast,
    /// URL handling.
    Urllib,
    /// Binary-to-text decoding.
    Base64,
}

impl Capability {
    /// The declared name, as it appears in configuration and prompts.
    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Ast => "ast",
            Self::Urllib => "urllib",
            Self::Base64 => "base64",
        }
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "ast" => Ok(Self::Ast),
            "urllib" => Ok(Self::Urllib),
            "base64" => Ok(Self::Base64),
            other => Err(Error::Unknown(other.to_string())),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered set of granted capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// An empty grant.
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a list of declared capability names. Any unknown name fails
    /// the whole set.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<_>>()
            .map(Self)
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Render the granted names for prompt or display use.
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(|c| c.name()).collect()
    }
}

impl Default for CapabilitySet {
    /// The full grant: every known capability.
    fn default() -> Self {
        Self(BTreeSet::from([
            Capability::Json,
            Capability::Ast,
            Capability::Urllib,
            Capability::Base64,
        ]))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        let set = CapabilitySet::parse(&["json", "ast", "urllib", "base64"]).unwrap();
        assert!(set.allows(Capability::Json));
        assert!(set.allows(Capability::Base64));
        assert_eq!(set, CapabilitySet::default());
    }

    #[test]
    fn unknown_name_rejected() {
        let err = CapabilitySet::parse(&["json", "subprocess"]).unwrap_err();
        assert!(matches!(err, Error::Unknown(ref name) if name == "subprocess"));
    }

    #[test]
    fn partial_grant() {
        let set = CapabilitySet::parse(&["json"]).unwrap();
        assert!(set.allows(Capability::Json));
        assert!(!set.allows(Capability::Urllib));
        assert_eq!(set.names(), vec!["json"]);
    }

    #[test]
    fn deserialize_from_toml_list() {
        #[derive(serde::Deserialize)]
        struct Agent {
            capabilities: CapabilitySet,
        }

        let agent: Agent = toml::from_str(r#"capabilities = ["json", "base64"]"#).unwrap();
        assert!(agent.capabilities.allows(Capability::Base64));
        assert!(!agent.capabilities.allows(Capability::Ast));

        let err = toml::from_str::<Agent>(r#"capabilities = ["socket"]"#);
        assert!(err.is_err());
    }

    #[test]
    fn serialize_round_trip() {
        let set = CapabilitySet::default();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["json","ast","urllib","base64"]"#);
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
