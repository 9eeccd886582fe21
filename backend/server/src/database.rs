//! # Record Store
//!
//! RAM database.
//!
//! Core purpose is to store and lookup users, artworks, tickets, proposals and votes. Also, the only place
//! proposal vote counters are incremented.
//!
//! ## Requirements
//!
//! - Fast lookups by wallet address, case-insensitive
//! - Small dataset, nothing is durable, a restart starts from the seed
//! - At most one vote per (proposal id, voter) pair, even under concurrent requests
//! - Proposal counters always equal the number of vote records of each type
//!
//! ## Implementation
//!
//! - One `RwLock` over every collection, readers share, writers are exclusive
//! - Each kind is a `HashMap` keyed by its UUID
//! - Secondary indexes: lowercased wallet -> user id, proposal id -> proposal uuid,
//!   (proposal id, lowercased voter) -> vote id
//! - Compound writes (fetch-or-create, cast vote) run entirely under a single write guard,
//!   so the duplicate check and the insert cannot interleave
//! - Listings sort newest first, insertion order breaks timestamp ties
use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    Artwork, DEFAULT_ROYALTY, NewArtwork, NewProposal, NewPurchase, NewTicket, NewUser, NewVote,
    Proposal, ProposalPatch, ProposalStatus, ProposalType, Purchase, Role, Ticket, User,
    UserPatch, VOTING_POWER, Vote,
};

pub const SEED_PROPOSER: &str = "0x0000000000000000000000000000000000000000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Wallet {0} is already registered")]
    DuplicateWallet(String),

    #[error("Proposal {0} already exists")]
    DuplicateProposal(String),

    #[error("Proposal {0} not found")]
    ProposalNotFound(String),

    #[error("Proposal {0} is not open for voting")]
    ProposalClosed(String),

    #[error("You have already voted on this proposal")]
    AlreadyVoted,

    #[error("Artwork {0} not found")]
    ArtworkNotFound(Uuid),
}

#[derive(Default)]
struct Tables {
    next_seq: u64,
    users: HashMap<Uuid, User>,
    wallets: HashMap<String, Uuid>,
    artworks: HashMap<Uuid, Artwork>,
    tickets: HashMap<Uuid, Ticket>,
    proposals: HashMap<Uuid, Proposal>,
    proposal_ids: HashMap<String, Uuid>,
    votes: HashMap<Uuid, Vote>,
    ballots: HashMap<(String, String), Uuid>,
    purchases: Vec<Purchase>,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn insert_user(&mut self, wallet_address: &str, role: Role, is_dao_member: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            wallet_address: wallet_address.to_string(),
            role,
            is_dao_member,
            created_at: Utc::now(),
        };

        self.wallets.insert(wallet_key(wallet_address), user.id);
        self.users.insert(user.id, user.clone());

        user
    }

    fn next_proposal_id(&self) -> String {
        let mut n = self.proposals.len() + 1;
        loop {
            let candidate = format!("prop-{n}");
            if !self.proposal_ids.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn insert_proposal(
        &mut self,
        input: NewProposal,
        created_at: DateTime<Utc>,
    ) -> Result<Proposal, StoreError> {
        let proposal_id = match &input.proposal_id {
            Some(proposal_id) => proposal_id.clone(),
            None => self.next_proposal_id(),
        };

        if self.proposal_ids.contains_key(&proposal_id) {
            return Err(StoreError::DuplicateProposal(proposal_id));
        }

        Ok(self.push_proposal(proposal_id, input, created_at))
    }

    /// Caller guarantees `proposal_id` is not taken yet.
    fn push_proposal(
        &mut self,
        proposal_id: String,
        input: NewProposal,
        created_at: DateTime<Utc>,
    ) -> Proposal {
        let proposal = Proposal {
            id: Uuid::new_v4(),
            proposal_id,
            title: input.title,
            description: input.description,
            proposer_address: input.proposer_address,
            proposal_type: input.proposal_type,
            votes_for: 0,
            votes_against: 0,
            votes_abstain: 0,
            status: ProposalStatus::Active,
            start_time: input.start_time.unwrap_or(created_at),
            end_time: input.end_time,
            created_at,
            seq: self.seq(),
        };

        self.proposal_ids
            .insert(proposal.proposal_id.clone(), proposal.id);
        self.proposals.insert(proposal.id, proposal.clone());

        proposal
    }
}

fn wallet_key(address: &str) -> String {
    address.to_lowercase()
}

fn same_wallet(a: &str, b: &str) -> bool {
    wallet_key(a) == wallet_key(b)
}

fn newest_first<T: Clone>(
    items: impl Iterator<Item = T>,
    key: impl Fn(&T) -> (DateTime<Utc>, u64),
) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

pub struct Store {
    inner: RwLock<Tables>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Tables::default()),
        }
    }

    /// Store preloaded with the two sample proposals shown on a fresh gallery.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let two_days_ago = now - Duration::days(2);

        let samples = [
            (
                "prop-1",
                NewProposal {
                    proposal_id: None,
                    title: "Add Contemporary Digital Art Exhibition".to_string(),
                    description: "Proposal to feature a special exhibition showcasing emerging digital artists and NFT creators from around the world.".to_string(),
                    proposer_address: SEED_PROPOSER.to_string(),
                    proposal_type: ProposalType::Exhibit,
                    start_time: Some(now),
                    end_time: now + Duration::days(7),
                },
                now,
            ),
            (
                "prop-2",
                NewProposal {
                    proposal_id: None,
                    title: "Virtual Reality Gallery Experience".to_string(),
                    description: "Introduce VR technology to allow visitors to experience artworks in immersive 3D environments.".to_string(),
                    proposer_address: SEED_PROPOSER.to_string(),
                    proposal_type: ProposalType::Event,
                    start_time: Some(two_days_ago),
                    end_time: now + Duration::days(5),
                },
                two_days_ago,
            ),
        ];

        let mut tables = Tables::default();
        for (proposal_id, proposal, created_at) in samples {
            tables.push_proposal(proposal_id.to_string(), proposal, created_at);
        }

        info!("Seeded {} sample proposals", tables.proposals.len());

        Self {
            inner: RwLock::new(tables),
        }
    }

    pub async fn create_user(&self, input: NewUser) -> Result<User, StoreError> {
        let mut tables = self.inner.write().await;

        if tables.wallets.contains_key(&wallet_key(&input.wallet_address)) {
            return Err(StoreError::DuplicateWallet(input.wallet_address));
        }

        Ok(tables.insert_user(
            &input.wallet_address,
            input.role,
            input.is_dao_member.unwrap_or(false),
        ))
    }

    pub async fn get_user(&self, id: Uuid) -> Option<User> {
        self.inner.read().await.users.get(&id).cloned()
    }

    pub async fn get_user_by_wallet(&self, wallet_address: &str) -> Option<User> {
        let tables = self.inner.read().await;

        tables
            .wallets
            .get(&wallet_key(wallet_address))
            .and_then(|id| tables.users.get(id))
            .cloned()
    }

    /// Returns the user and whether it was created by this call.
    pub async fn get_or_create_user(
        &self,
        wallet_address: &str,
        role: Role,
        is_dao_member: bool,
    ) -> (User, bool) {
        let mut tables = self.inner.write().await;

        let existing = tables
            .wallets
            .get(&wallet_key(wallet_address))
            .and_then(|id| tables.users.get(id))
            .cloned();

        match existing {
            Some(user) => (user, false),
            None => (tables.insert_user(wallet_address, role, is_dao_member), true),
        }
    }

    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> Option<User> {
        let mut tables = self.inner.write().await;
        let user = tables.users.get_mut(&id)?;

        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(is_dao_member) = patch.is_dao_member {
            user.is_dao_member = is_dao_member;
        }

        Some(user.clone())
    }

    pub async fn list_artworks(&self) -> Vec<Artwork> {
        let tables = self.inner.read().await;

        newest_first(tables.artworks.values().cloned(), |a| (a.minted_at, a.seq))
    }

    pub async fn artworks_by_artist(&self, artist_address: &str) -> Vec<Artwork> {
        let tables = self.inner.read().await;

        newest_first(
            tables
                .artworks
                .values()
                .filter(|a| same_wallet(&a.artist_address, artist_address))
                .cloned(),
            |a| (a.minted_at, a.seq),
        )
    }

    pub async fn get_artwork(&self, id: Uuid) -> Option<Artwork> {
        self.inner.read().await.artworks.get(&id).cloned()
    }

    pub async fn create_artwork(&self, input: NewArtwork) -> Artwork {
        let mut tables = self.inner.write().await;

        let artwork = Artwork {
            id: Uuid::new_v4(),
            token_id: input.token_id,
            title: input.title,
            description: input.description,
            artist_address: input.artist_address,
            artist_name: input.artist_name,
            ipfs_hash: input.ipfs_hash,
            metadata_uri: input.metadata_uri,
            contract_address: input.contract_address,
            price: input.price,
            royalty_percentage: input
                .royalty_percentage
                .unwrap_or_else(|| DEFAULT_ROYALTY.to_string()),
            minted_at: Utc::now(),
            seq: tables.seq(),
        };

        tables.artworks.insert(artwork.id, artwork.clone());

        artwork
    }

    pub async fn tickets_by_visitor(&self, visitor_address: &str) -> Vec<Ticket> {
        let tables = self.inner.read().await;

        newest_first(
            tables
                .tickets
                .values()
                .filter(|t| same_wallet(&t.visitor_address, visitor_address))
                .cloned(),
            |t| (t.purchased_at, t.seq),
        )
    }

    pub async fn create_ticket(&self, input: NewTicket) -> Ticket {
        let mut tables = self.inner.write().await;

        let ticket = Ticket {
            id: Uuid::new_v4(),
            visitor_address: input.visitor_address,
            ticket_type: input.ticket_type,
            price: input.ticket_type.price().to_string(),
            purchased_at: Utc::now(),
            transaction_hash: input.transaction_hash,
            seq: tables.seq(),
        };

        tables.tickets.insert(ticket.id, ticket.clone());

        ticket
    }

    /// Any ticket ever bought grants gallery access, there is no expiry or revocation.
    pub async fn has_valid_ticket(&self, visitor_address: &str) -> bool {
        self.inner
            .read()
            .await
            .tickets
            .values()
            .any(|t| same_wallet(&t.visitor_address, visitor_address))
    }

    pub async fn list_proposals(&self) -> Vec<Proposal> {
        let tables = self.inner.read().await;

        newest_first(tables.proposals.values().cloned(), |p| (p.created_at, p.seq))
    }

    pub async fn get_proposal(&self, id: Uuid) -> Option<Proposal> {
        self.inner.read().await.proposals.get(&id).cloned()
    }

    pub async fn get_proposal_by_proposal_id(&self, proposal_id: &str) -> Option<Proposal> {
        let tables = self.inner.read().await;

        tables
            .proposal_ids
            .get(proposal_id)
            .and_then(|id| tables.proposals.get(id))
            .cloned()
    }

    pub async fn create_proposal(&self, input: NewProposal) -> Result<Proposal, StoreError> {
        self.inner
            .write()
            .await
            .insert_proposal(input, Utc::now())
    }

    pub async fn update_proposal(&self, id: Uuid, patch: ProposalPatch) -> Option<Proposal> {
        let mut tables = self.inner.write().await;
        let proposal = tables.proposals.get_mut(&id)?;

        if let Some(title) = patch.title {
            proposal.title = title;
        }
        if let Some(description) = patch.description {
            proposal.description = description;
        }
        if let Some(status) = patch.status {
            proposal.status = status;
        }
        if let Some(end_time) = patch.end_time {
            proposal.end_time = end_time;
        }

        Some(proposal.clone())
    }

    pub async fn votes_by_proposal(&self, proposal_id: &str) -> Vec<Vote> {
        let tables = self.inner.read().await;

        newest_first(
            tables
                .votes
                .values()
                .filter(|v| v.proposal_id == proposal_id)
                .cloned(),
            |v| (v.voted_at, v.seq),
        )
    }

    pub async fn get_vote_by_user(&self, proposal_id: &str, voter_address: &str) -> Option<Vote> {
        let tables = self.inner.read().await;

        tables
            .ballots
            .get(&(proposal_id.to_string(), wallet_key(voter_address)))
            .and_then(|id| tables.votes.get(id))
            .cloned()
    }

    /// Records a vote and bumps the matching counter as one step.
    ///
    /// The duplicate check, the vote insert and the counter increment all happen under the same
    /// write guard, so two concurrent ballots from one voter resolve to exactly one vote.
    pub async fn cast_vote(&self, input: NewVote) -> Result<(Vote, Proposal), StoreError> {
        let mut guard = self.inner.write().await;
        let tables = &mut *guard;

        let proposal_uuid = *tables
            .proposal_ids
            .get(&input.proposal_id)
            .ok_or_else(|| StoreError::ProposalNotFound(input.proposal_id.clone()))?;

        let proposal = tables
            .proposals
            .get_mut(&proposal_uuid)
            .ok_or_else(|| StoreError::ProposalNotFound(input.proposal_id.clone()))?;

        if proposal.status != ProposalStatus::Active {
            return Err(StoreError::ProposalClosed(input.proposal_id));
        }

        let ballot = match tables
            .ballots
            .entry((input.proposal_id.clone(), wallet_key(&input.voter_address)))
        {
            Entry::Occupied(_) => return Err(StoreError::AlreadyVoted),
            Entry::Vacant(entry) => entry,
        };

        tables.next_seq += 1;
        let vote = Vote {
            id: Uuid::new_v4(),
            proposal_id: input.proposal_id,
            voter_address: input.voter_address,
            vote_type: input.vote_type,
            voting_power: VOTING_POWER.to_string(),
            voted_at: Utc::now(),
            seq: tables.next_seq,
        };

        ballot.insert(vote.id);
        proposal.count(vote.vote_type);
        tables.votes.insert(vote.id, vote.clone());

        Ok((vote, proposal.clone()))
    }

    pub async fn record_purchase(&self, input: NewPurchase) -> Result<Purchase, StoreError> {
        let mut tables = self.inner.write().await;

        let artist_address = tables
            .artworks
            .get(&input.artwork_id)
            .map(|a| a.artist_address.clone())
            .ok_or(StoreError::ArtworkNotFound(input.artwork_id))?;

        let purchase = Purchase {
            id: Uuid::new_v4(),
            artwork_id: input.artwork_id,
            buyer_address: input.buyer_address,
            artist_address,
            price: input.price,
            transaction_hash: input.transaction_hash,
            purchased_at: Utc::now(),
        };

        tables.purchases.push(purchase.clone());

        Ok(purchase)
    }

    pub async fn purchases_of(&self, artwork_id: Uuid) -> Vec<Purchase> {
        self.inner
            .read()
            .await
            .purchases
            .iter()
            .filter(|p| p.artwork_id == artwork_id)
            .cloned()
            .collect()
    }
}
