//! Investor tracking: who a deck was pitched to and where each conversation stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a conversation with an investor stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvestorStatus {
    #[default]
    Pitched,
    #[serde(rename = "Followed Up")]
    FollowedUp,
    Interested,
    #[serde(rename = "Not Interested")]
    NotInterested,
}

impl InvestorStatus {
    pub const ALL: [InvestorStatus; 4] = [
        InvestorStatus::Pitched,
        InvestorStatus::FollowedUp,
        InvestorStatus::Interested,
        InvestorStatus::NotInterested,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InvestorStatus::Pitched => "Pitched",
            InvestorStatus::FollowedUp => "Followed Up",
            InvestorStatus::Interested => "Interested",
            InvestorStatus::NotInterested => "Not Interested",
        }
    }
}

impl fmt::Display for InvestorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One investor a document was pitched to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firm: Option<String>,
    #[serde(default)]
    pub status: InvestorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Id of the document that was pitched.
    pub pitched_deck_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Investor {
    /// A fresh record in the `Pitched` state.
    pub fn new(name: impl Into<String>, pitched_deck_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: None,
            firm: None,
            status: InvestorStatus::Pitched,
            notes: None,
            pitched_deck_id: pitched_deck_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
