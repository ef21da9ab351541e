//! Lifecycle state types for Sieve.
//!
//! An item lives in exactly one of four stages. The stage graph is fixed:
//! `Draft → Candidate → Validated → Approved`, with `Approved` terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a corpus item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Raw ingested payload.
    Draft,
    /// Normalized payload awaiting quality gates.
    Candidate,
    /// Passed every gate, awaiting approval.
    Validated,
    /// Canonical, immutable record.
    Approved,
}

impl LifecycleState {
    /// All states in lifecycle order.
    pub const ALL: [LifecycleState; 4] = [
        LifecycleState::Draft,
        LifecycleState::Candidate,
        LifecycleState::Validated,
        LifecycleState::Approved,
    ];

    /// Upper-case wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Draft => "DRAFT",
            LifecycleState::Candidate => "CANDIDATE",
            LifecycleState::Validated => "VALIDATED",
            LifecycleState::Approved => "APPROVED",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(LifecycleState::Draft),
            "CANDIDATE" => Ok(LifecycleState::Candidate),
            "VALIDATED" => Ok(LifecycleState::Validated),
            "APPROVED" => Ok(LifecycleState::Approved),
            other => Err(format!("unknown lifecycle state: '{}'", other)),
        }
    }
}

/// Kind of linguistic item moving through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A vocabulary entry.
    Word,
    /// A grammar rule with explanation.
    GrammarRule,
    /// A practice exercise.
    Exercise,
}

impl ItemType {
    /// Snake-case name used in storage locations and records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Word => "word",
            ItemType::GrammarRule => "grammar_rule",
            ItemType::Exercise => "exercise",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "word" => Ok(ItemType::Word),
            "grammar_rule" | "grammar" => Ok(ItemType::GrammarRule),
            "exercise" => Ok(ItemType::Exercise),
            other => Err(format!("unknown item type: '{}'", other)),
        }
    }
}

/// CEFR proficiency level, ordered from A1 (lowest) to C2 (highest).
///
/// Deserializes through [`FromStr`](std::str::FromStr), so `"b2"` and `"B2"`
/// read the same everywhere a level is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    /// All levels in ascending order.
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];

    /// Canonical upper-case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for CefrLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A recorded move of one item between two adjacent lifecycle states.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    /// Item identifier.
    pub item_id: String,
    /// Item kind.
    pub item_type: ItemType,
    /// State the item left.
    pub from_state: LifecycleState,
    /// State the item entered.
    pub to_state: LifecycleState,
    /// When the transition happened.
    pub timestamp: DateTime<Utc>,
    /// Free-form context supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl StateTransition {
    /// Create a transition stamped with the current time.
    pub fn new(
        item_id: impl Into<String>,
        item_type: ItemType,
        from_state: LifecycleState,
        to_state: LifecycleState,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            item_type,
            from_state,
            to_state,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
