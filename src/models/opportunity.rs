//! Volunteer opportunity model and request bodies.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A volunteer engagement listing with capacity and lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub opportunity_id: String,
    pub title: String,
    pub category: String,
    pub location: String,
    pub time_commitment: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(with = "crate::models::active_flag")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volunteers: Option<i64>,
    #[serde(default)]
    pub current_volunteers: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Request body for creating a new opportunity.
///
/// Required text fields default to empty so that a missing field surfaces as a
/// validation error rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunityRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub time_commitment: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default, deserialize_with = "crate::models::active_flag::option::deserialize")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub max_volunteers: Option<i64>,
}

impl CreateOpportunityRequest {
    /// Names of required fields that are absent or blank, in wire spelling.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("title", &self.title),
            ("category", &self.category),
            ("location", &self.location),
            ("timeCommitment", &self.time_commitment),
            ("description", &self.description),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Check the payload before it reaches the store.
    pub fn validate(&self) -> Result<(), AppError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }
        validate_capacity(self.max_volunteers)
    }
}

/// Request body for a partial update.
///
/// The store-managed fields are captured only so their presence can be
/// rejected; they are never applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpportunityRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time_commitment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<Vec<String>>,
    #[serde(default)]
    pub benefits: Option<Vec<String>>,
    #[serde(default, deserialize_with = "crate::models::active_flag::option::deserialize")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub max_volunteers: Option<i64>,

    #[serde(default)]
    pub opportunity_id: Option<serde_json::Value>,
    #[serde(default)]
    pub current_volunteers: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub updated_at: Option<serde_json::Value>,
}

impl UpdateOpportunityRequest {
    /// True when no mutable field is present.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.location.is_none()
            && self.time_commitment.is_none()
            && self.description.is_none()
            && self.requirements.is_none()
            && self.benefits.is_none()
            && self.is_active.is_none()
            && self.max_volunteers.is_none()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.opportunity_id.is_some() {
            return Err(AppError::Validation(
                "opportunityId cannot be updated".to_string(),
            ));
        }
        if self.current_volunteers.is_some() {
            return Err(AppError::Validation(
                "currentVolunteers can only change through the volunteer count endpoints"
                    .to_string(),
            ));
        }
        if self.created_at.is_some() || self.updated_at.is_some() {
            return Err(AppError::Validation(
                "Timestamps are managed by the server".to_string(),
            ));
        }
        if self.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let blank = [
            ("title", &self.title),
            ("category", &self.category),
            ("location", &self.location),
            ("timeCommitment", &self.time_commitment),
            ("description", &self.description),
        ]
        .into_iter()
        .find(|(_, value)| value.as_deref().is_some_and(|v| v.trim().is_empty()));
        if let Some((name, _)) = blank {
            return Err(AppError::Validation(format!("{} cannot be empty", name)));
        }

        validate_capacity(self.max_volunteers)
    }
}

fn validate_capacity(max_volunteers: Option<i64>) -> Result<(), AppError> {
    match max_volunteers {
        Some(max) if max < 1 => Err(AppError::Validation(
            "maxVolunteers must be at least 1".to_string(),
        )),
        _ => Ok(()),
    }
}
