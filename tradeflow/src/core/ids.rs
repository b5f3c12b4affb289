//! Closed identifier sets for stages, debate roles and debates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// An analyst stage known to the registry.
///
/// The declaration order is the canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Price action and technical indicators.
    Market,
    /// Social media sentiment.
    Social,
    /// News and macro events.
    News,
    /// Company financials.
    Fundamentals,
}

impl StageId {
    /// All stages in canonical order.
    pub const ALL: [Self; 4] = [Self::Market, Self::Social, Self::News, Self::Fundamentals];

    /// Returns the stable identifier string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Social => "social",
            Self::News => "news",
            Self::Fundamentals => "fundamentals",
        }
    }

    /// Returns the key under which the stage's report is handed to debaters.
    #[must_use]
    pub const fn report_key(&self) -> &'static str {
        match self {
            Self::Market => "market_report",
            Self::Social => "sentiment_report",
            Self::News => "news_report",
            Self::Fundamentals => "fundamentals_report",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownStage(s.to_string()))
    }
}

/// Which of the two debate seats a role occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Opens every round.
    A,
    /// Responds to side A.
    B,
}

/// A debating role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleId {
    /// Argues for the investment.
    Bull,
    /// Argues against the investment.
    Bear,
    /// Pushes for higher risk, higher reward.
    Aggressive,
    /// Pushes for capital preservation.
    Conservative,
}

impl RoleId {
    /// All roles.
    pub const ALL: [Self; 4] = [Self::Bull, Self::Bear, Self::Aggressive, Self::Conservative];

    /// Returns the stable identifier string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Bear => "bear",
            Self::Aggressive => "aggressive",
            Self::Conservative => "conservative",
        }
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two debates of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateKind {
    /// Research team: bull vs bear, judged by the research manager.
    Research,
    /// Risk management team: aggressive vs conservative, judged by the risk judge.
    Risk,
}

impl DebateKind {
    /// Both debates in execution order.
    pub const ALL: [Self; 2] = [Self::Research, Self::Risk];

    /// Returns the stable identifier string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Risk => "risk",
        }
    }

    /// Returns the fixed opposing roles as `(side A, side B)`.
    #[must_use]
    pub const fn roles(&self) -> (RoleId, RoleId) {
        match self {
            Self::Research => (RoleId::Bull, RoleId::Bear),
            Self::Risk => (RoleId::Aggressive, RoleId::Conservative),
        }
    }

    /// Returns the role occupying the given side.
    #[must_use]
    pub const fn role(&self, side: Side) -> RoleId {
        let (a, b) = self.roles();
        match side {
            Side::A => a,
            Side::B => b,
        }
    }
}

impl fmt::Display for DebateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost/latency tier of the model a capability should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Heavy reasoning (debate synthesis).
    Deep,
    /// Light, fast calls (analysts, debaters, trader).
    Quick,
}
