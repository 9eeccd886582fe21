//! # Records
//!
//! Every record kind the museum keeps, plus the inputs used to create or patch them.
//!
//! ## Notes
//! - JSON field names are camelCase to match what the frontend already sends and reads
//! - Identities are UUID v4, timestamps are UTC
//! - Money amounts (ETH) stay decimal strings, nothing here does arithmetic on them
//! - `seq` is a store-assigned insertion counter, used only to break timestamp ties when listing
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ROYALTY: &str = "5";
pub const VOTING_POWER: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Artist,
    Visitor,
    DaoMember,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
    pub role: Role,
    pub is_dao_member: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub wallet_address: String,
    pub role: Role,
    #[serde(default)]
    pub is_dao_member: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub role: Option<Role>,
    pub is_dao_member: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub id: Uuid,
    pub token_id: String,
    pub title: String,
    pub description: String,
    pub artist_address: String,
    pub artist_name: Option<String>,
    pub ipfs_hash: String,
    pub metadata_uri: String,
    pub contract_address: Option<String>,
    pub price: Option<String>,
    pub royalty_percentage: String,
    pub minted_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct NewArtwork {
    pub token_id: String,
    pub title: String,
    pub description: String,
    pub artist_address: String,
    pub artist_name: Option<String>,
    pub ipfs_hash: String,
    pub metadata_uri: String,
    pub contract_address: Option<String>,
    pub price: Option<String>,
    pub royalty_percentage: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    General,
    Premium,
    Vip,
}

impl TicketType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "general" => Some(TicketType::General),
            "premium" => Some(TicketType::Premium),
            "vip" => Some(TicketType::Vip),
            _ => None,
        }
    }

    /// Price in ETH.
    pub fn price(self) -> &'static str {
        match self {
            TicketType::General => "0.01",
            TicketType::Premium => "0.02",
            TicketType::Vip => "0.05",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub visitor_address: String,
    pub ticket_type: TicketType,
    pub price: String,
    pub purchased_at: DateTime<Utc>,
    pub transaction_hash: Option<String>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub visitor_address: String,
    pub ticket_type: TicketType,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalType {
    Exhibit,
    Event,
    Governance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Active,
    Passed,
    Rejected,
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: Uuid,
    pub proposal_id: String,
    pub title: String,
    pub description: String,
    pub proposer_address: String,
    pub proposal_type: ProposalType,
    pub votes_for: u64,
    pub votes_against: u64,
    pub votes_abstain: u64,
    pub status: ProposalStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl Proposal {
    pub fn tally(&self, vote_type: VoteType) -> u64 {
        match vote_type {
            VoteType::For => self.votes_for,
            VoteType::Against => self.votes_against,
            VoteType::Abstain => self.votes_abstain,
        }
    }

    pub(crate) fn count(&mut self, vote_type: VoteType) {
        let counter = match vote_type {
            VoteType::For => &mut self.votes_for,
            VoteType::Against => &mut self.votes_against,
            VoteType::Abstain => &mut self.votes_abstain,
        };
        *counter += 1;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProposal {
    #[serde(default)]
    pub proposal_id: Option<String>,
    pub title: String,
    pub description: String,
    pub proposer_address: String,
    pub proposal_type: ProposalType,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
}

/// Vote counters are not patchable, they only move through [`crate::database::Store::cast_vote`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProposalStatus>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    For,
    Against,
    Abstain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub proposal_id: String,
    pub voter_address: String,
    pub vote_type: VoteType,
    pub voting_power: String,
    pub voted_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) seq: u64,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub proposal_id: String,
    pub voter_address: String,
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub artwork_id: Uuid,
    pub buyer_address: String,
    pub artist_address: String,
    pub price: Option<String>,
    pub transaction_hash: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub artwork_id: Uuid,
    pub buyer_address: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}
