//! Opportunity API endpoints.

use axum::extract::{Path, State};
use serde::Serialize;

use super::{created, success, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{
    CreateOpportunityRequest, Opportunity, OpportunityStats, UpdateOpportunityRequest,
};
use crate::AppState;

/// Payload returned after a delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedOpportunity {
    pub opportunity_id: String,
}

/// GET /api/opportunities - List all opportunities.
pub async fn list_opportunities(State(state): State<AppState>) -> ApiResult<Vec<Opportunity>> {
    let opportunities = state.repo.list_opportunities().await?;
    success("Opportunities retrieved", opportunities)
}

/// GET /api/opportunities/active - List active opportunities.
pub async fn list_active_opportunities(
    State(state): State<AppState>,
) -> ApiResult<Vec<Opportunity>> {
    let opportunities = state.repo.list_active_opportunities().await?;
    success("Active opportunities retrieved", opportunities)
}

/// GET /api/opportunities/category/:category - List active opportunities in a category.
pub async fn list_opportunities_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> ApiResult<Vec<Opportunity>> {
    let opportunities = state.repo.list_opportunities_by_category(&category).await?;
    success(
        format!("Opportunities in category {} retrieved", category),
        opportunities,
    )
}

/// GET /api/opportunities/stats/overview - Aggregate counts.
pub async fn get_opportunity_stats(State(state): State<AppState>) -> ApiResult<OpportunityStats> {
    let stats = state.repo.get_stats().await?;
    success("Opportunity statistics retrieved", stats)
}

/// GET /api/opportunities/:id - Get a single opportunity.
pub async fn get_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Opportunity> {
    match state.repo.get_opportunity(&id).await? {
        Some(opportunity) => success("Opportunity retrieved", opportunity),
        None => Err(AppError::NotFound(format!("Opportunity {} not found", id))),
    }
}

/// POST /api/opportunities - Create a new opportunity.
pub async fn create_opportunity(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateOpportunityRequest>,
) -> ApiResult<Opportunity> {
    request.validate()?;

    let opportunity = state.repo.create_opportunity(&request).await?;
    created("Opportunity created", opportunity)
}

/// PUT /api/opportunities/:id - Partially update an opportunity.
pub async fn update_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateOpportunityRequest>,
) -> ApiResult<Opportunity> {
    let opportunity = state.repo.update_opportunity(&id, &request).await?;
    success("Opportunity updated", opportunity)
}

/// DELETE /api/opportunities/:id - Delete an opportunity.
pub async fn delete_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeletedOpportunity> {
    // The store does not report missing ids on delete
    if state.repo.get_opportunity(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Opportunity {} not found", id)));
    }

    state.repo.delete_opportunity(&id).await?;
    success(
        "Opportunity deleted",
        DeletedOpportunity { opportunity_id: id },
    )
}

/// PATCH /api/opportunities/:id/toggle - Flip the active flag.
pub async fn toggle_opportunity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Opportunity> {
    let opportunity = state.repo.toggle_opportunity_active(&id).await?;
    let message = if opportunity.is_active {
        "Opportunity activated"
    } else {
        "Opportunity deactivated"
    };
    success(message, opportunity)
}

/// PATCH /api/opportunities/:id/volunteers/increment - Add one volunteer.
pub async fn increment_volunteers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Opportunity> {
    let opportunity = state.repo.increment_volunteer_count(&id).await?;
    success("Volunteer count incremented", opportunity)
}

/// PATCH /api/opportunities/:id/volunteers/decrement - Remove one volunteer.
pub async fn decrement_volunteers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Opportunity> {
    let opportunity = state.repo.decrement_volunteer_count(&id).await?;
    success("Volunteer count decremented", opportunity)
}
