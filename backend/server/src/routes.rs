use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        NewProposal, NewPurchase, NewTicket, NewUser, NewVote, ProposalPatch, Role, TicketType,
        UserPatch, VoteType,
    },
    state::AppState,
    utils::{mock_transaction_hash, optional_body, resolve_address, require},
};

type Shared = State<Arc<AppState>>;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    ticket_type: Option<String>,
    visitor_address: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    wallet_address: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    proposal_id: Option<String>,
    vote_type: Option<VoteType>,
    voter_address: Option<String>,
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found_handler() -> AppError {
    AppError::NotFound("Not found".to_string())
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

pub async fn me_handler(
    State(state): Shared,
    Path(wallet_address): Path<String>,
) -> impl IntoResponse {
    let (user, created) = state
        .store
        .get_or_create_user(&wallet_address, Role::Visitor, false)
        .await;

    if created {
        info!("Registered visitor {wallet_address}");
    }

    Json(user)
}

pub async fn create_user_handler(
    State(state): Shared,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let user = state.store.create_user(input).await?;

    info!("Created {:?} {}", user.role, user.wallet_address);

    Ok(Json(user))
}

pub async fn artworks_handler(State(state): Shared) -> impl IntoResponse {
    Json(state.store.list_artworks().await)
}

pub async fn artist_artworks_handler(
    State(state): Shared,
    Path(artist_address): Path<String>,
) -> impl IntoResponse {
    Json(state.store.artworks_by_artist(&artist_address).await)
}

/// Records a purchase the client already settled through its wallet. Nothing is verified on chain.
pub async fn purchase_artwork_handler(
    State(state): Shared,
    payload: Result<Json<NewPurchase>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let purchase = state.store.record_purchase(input).await?;

    info!(
        "Artwork {} bought by {} for {}",
        purchase.artwork_id,
        purchase.buyer_address,
        purchase.price.as_deref().unwrap_or("unknown")
    );

    Ok(Json(json!({
        "success": true,
        "purchase": purchase,
        "message": "Purchase recorded successfully!",
    })))
}

pub async fn artwork_purchases_handler(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation(format!("Invalid artwork id {id}")))?;

    if state.store.get_artwork(id).await.is_none() {
        return Err(AppError::NotFound(format!("Artwork {id} not found")));
    }

    Ok(Json(state.store.purchases_of(id).await))
}

pub async fn purchase_ticket_handler(
    State(state): Shared,
    headers: HeaderMap,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = optional_body(payload)?;
    let visitor_address = resolve_address(request.visitor_address, &headers, "Visitor")?;

    let ticket_type = request
        .ticket_type
        .as_deref()
        .and_then(TicketType::parse)
        .ok_or_else(|| AppError::Validation("Invalid ticket type".to_string()))?;

    let ticket = state
        .store
        .create_ticket(NewTicket {
            visitor_address,
            ticket_type,
            transaction_hash: Some(mock_transaction_hash()),
        })
        .await;

    info!("{:?} ticket sold to {}", ticket.ticket_type, ticket.visitor_address);

    Ok(Json(json!({
        "success": true,
        "ticket": ticket,
        "message": "Ticket purchased successfully!",
    })))
}

pub async fn check_ticket_handler(
    State(state): Shared,
    Path(visitor_address): Path<String>,
) -> impl IntoResponse {
    let tickets = state.store.tickets_by_visitor(&visitor_address).await;

    Json(json!({
        "hasValidTicket": !tickets.is_empty(),
        "tickets": tickets,
    }))
}

pub async fn join_dao_handler(
    State(state): Shared,
    headers: HeaderMap,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = optional_body(payload)?;
    let wallet_address = resolve_address(request.wallet_address, &headers, "Wallet")?;

    let (mut user, _) = state
        .store
        .get_or_create_user(&wallet_address, Role::Visitor, true)
        .await;

    if !user.is_dao_member {
        user = state
            .store
            .update_user(
                user.id,
                UserPatch {
                    is_dao_member: Some(true),
                    ..Default::default()
                },
            )
            .await
            .ok_or_else(|| AppError::NotFound(format!("User {wallet_address} not found")))?;
    }

    info!("{wallet_address} joined the DAO");

    Ok(Json(json!({
        "success": true,
        "user": user,
        "message": "Successfully joined the DAO!",
    })))
}

pub async fn proposals_handler(State(state): Shared) -> impl IntoResponse {
    Json(state.store.list_proposals().await)
}

pub async fn create_proposal_handler(
    State(state): Shared,
    payload: Result<Json<NewProposal>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let proposal = state.store.create_proposal(input).await?;

    info!("Proposal {} opened by {}", proposal.proposal_id, proposal.proposer_address);

    Ok(Json(proposal))
}

pub async fn update_proposal_handler(
    State(state): Shared,
    Path(id): Path<String>,
    payload: Result<Json<ProposalPatch>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(patch) = payload?;
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation(format!("Invalid proposal id {id}")))?;

    let proposal = state
        .store
        .update_proposal(id, patch)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Proposal {id} not found")))?;

    info!("Proposal {} is {:?}", proposal.proposal_id, proposal.status);

    Ok(Json(proposal))
}

pub async fn proposal_votes_handler(
    State(state): Shared,
    Path(proposal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state
        .store
        .get_proposal_by_proposal_id(&proposal_id)
        .await
        .is_none()
    {
        return Err(AppError::NotFound(format!("Proposal {proposal_id} not found")));
    }

    Ok(Json(state.store.votes_by_proposal(&proposal_id).await))
}

pub async fn vote_handler(
    State(state): Shared,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = optional_body(payload)?;
    let voter_address = resolve_address(request.voter_address, &headers, "Voter")?;
    let proposal_id = require(request.proposal_id, "proposalId")?;
    let vote_type = request
        .vote_type
        .ok_or_else(|| AppError::Validation("voteType is required".to_string()))?;

    let (vote, proposal) = state
        .store
        .cast_vote(NewVote {
            proposal_id,
            voter_address,
            vote_type,
        })
        .await?;

    info!(
        "{} voted {:?} on {} ({}/{}/{})",
        vote.voter_address,
        vote.vote_type,
        proposal.proposal_id,
        proposal.votes_for,
        proposal.votes_against,
        proposal.votes_abstain
    );

    Ok(Json(json!({
        "success": true,
        "vote": vote,
        "message": "Vote submitted successfully!",
    })))
}
