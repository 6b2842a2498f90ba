//! Database repository for opportunity CRUD operations.
//!
//! The repository trusts its caller for create payloads; update payloads are
//! checked here because the identifier and counter rules belong to the store.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::time::{generate_opportunity_id, next_timestamp, now_timestamp};
use crate::errors::AppError;
use crate::models::{
    CreateOpportunityRequest, Opportunity, OpportunityStats, UpdateOpportunityRequest,
};

pub(crate) const LIST_ALL_SQL: &str = r#"SELECT id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at
            FROM opportunities ORDER BY created_at DESC"#;

pub(crate) const LIST_ACTIVE_SQL: &str = r#"SELECT id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at
            FROM opportunities WHERE is_active = 1 ORDER BY created_at DESC"#;

pub(crate) const LIST_BY_CATEGORY_SQL: &str = r#"SELECT id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at
            FROM opportunities WHERE category = ? AND is_active = 1 ORDER BY created_at DESC"#;

const GET_BY_ID_SQL: &str = r#"SELECT id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at
            FROM opportunities WHERE id = ?"#;

const INCREMENT_VOLUNTEERS_SQL: &str = r#"UPDATE opportunities
               SET current_volunteers = current_volunteers + 1, updated_at = ?
               WHERE id = ? AND updated_at = ?
                 AND (max_volunteers IS NULL OR current_volunteers < max_volunteers)
               RETURNING id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at"#;

const DECREMENT_VOLUNTEERS_SQL: &str = r#"UPDATE opportunities
               SET current_volunteers = current_volunteers - 1, updated_at = ?
               WHERE id = ? AND updated_at = ? AND current_volunteers > 0
               RETURNING id, title, category, location, time_commitment, description,
                   requirements, benefits, is_active, max_volunteers, current_volunteers,
                   created_at, updated_at"#;

/// Each lost race means another write landed.
const MAX_WRITE_ATTEMPTS: usize = 32;

/// Database repository for all opportunity operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List every opportunity, newest first.
    pub async fn list_opportunities(&self) -> Result<Vec<Opportunity>, AppError> {
        let rows = sqlx::query(LIST_ALL_SQL).fetch_all(&self.pool).await?;
        opportunities_from_rows(&rows)
    }

    /// List active opportunities, newest first.
    pub async fn list_active_opportunities(&self) -> Result<Vec<Opportunity>, AppError> {
        let rows = sqlx::query(LIST_ACTIVE_SQL).fetch_all(&self.pool).await?;
        opportunities_from_rows(&rows)
    }

    /// List active opportunities in one category, newest first.
    pub async fn list_opportunities_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<Opportunity>, AppError> {
        let rows = sqlx::query(LIST_BY_CATEGORY_SQL)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;
        opportunities_from_rows(&rows)
    }

    /// Get an opportunity by ID.
    pub async fn get_opportunity(&self, id: &str) -> Result<Option<Opportunity>, AppError> {
        let row = sqlx::query(GET_BY_ID_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(opportunity_from_row).transpose()
    }

    /// Create a new opportunity.
    pub async fn create_opportunity(
        &self,
        request: &CreateOpportunityRequest,
    ) -> Result<Opportunity, AppError> {
        let id = generate_opportunity_id();
        let now = now_timestamp();
        let is_active = request.is_active.unwrap_or(true);
        let requirements_json = serde_json::to_string(&request.requirements)?;
        let benefits_json = serde_json::to_string(&request.benefits)?;

        sqlx::query(
            r#"INSERT INTO opportunities (
                id, title, category, location, time_commitment, description,
                requirements, benefits, is_active, max_volunteers, current_volunteers,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.title)
        .bind(&request.category)
        .bind(&request.location)
        .bind(&request.time_commitment)
        .bind(&request.description)
        .bind(&requirements_json)
        .bind(&benefits_json)
        .bind(is_active)
        .bind(request.max_volunteers)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!(opportunity_id = %id, "Created opportunity");

        Ok(Opportunity {
            opportunity_id: id,
            title: request.title.clone(),
            category: request.category.clone(),
            location: request.location.clone(),
            time_commitment: request.time_commitment.clone(),
            description: request.description.clone(),
            requirements: request.requirements.clone(),
            benefits: request.benefits.clone(),
            is_active,
            max_volunteers: request.max_volunteers,
            current_volunteers: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Apply a partial update. Last writer wins; there is no version check on
    /// the caller's side. The write is guarded on the `updated_at` it merged
    /// against and merges again when another write got in first.
    pub async fn update_opportunity(
        &self,
        id: &str,
        request: &UpdateOpportunityRequest,
    ) -> Result<Opportunity, AppError> {
        request.validate()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let existing = self
                .get_opportunity(id)
                .await?
                .ok_or_else(|| not_found(id))?;

            if let Some(max) = request.max_volunteers {
                if max < existing.current_volunteers {
                    return Err(AppError::Validation(format!(
                        "maxVolunteers cannot be below the current volunteer count ({})",
                        existing.current_volunteers
                    )));
                }
            }

            let previous_updated_at = existing.updated_at.clone();
            let updated = Opportunity {
                opportunity_id: existing.opportunity_id,
                title: request.title.clone().unwrap_or(existing.title),
                category: request.category.clone().unwrap_or(existing.category),
                location: request.location.clone().unwrap_or(existing.location),
                time_commitment: request
                    .time_commitment
                    .clone()
                    .unwrap_or(existing.time_commitment),
                description: request.description.clone().unwrap_or(existing.description),
                requirements: request
                    .requirements
                    .clone()
                    .unwrap_or(existing.requirements),
                benefits: request.benefits.clone().unwrap_or(existing.benefits),
                is_active: request.is_active.unwrap_or(existing.is_active),
                max_volunteers: request.max_volunteers.or(existing.max_volunteers),
                current_volunteers: existing.current_volunteers,
                created_at: existing.created_at,
                updated_at: next_timestamp(&previous_updated_at),
            };

            let requirements_json = serde_json::to_string(&updated.requirements)?;
            let benefits_json = serde_json::to_string(&updated.benefits)?;

            let result = sqlx::query(
                r#"UPDATE opportunities SET
                    title = ?, category = ?, location = ?, time_commitment = ?, description = ?,
                    requirements = ?, benefits = ?, is_active = ?, max_volunteers = ?, updated_at = ?
                WHERE id = ? AND updated_at = ?"#,
            )
            .bind(&updated.title)
            .bind(&updated.category)
            .bind(&updated.location)
            .bind(&updated.time_commitment)
            .bind(&updated.description)
            .bind(&requirements_json)
            .bind(&benefits_json)
            .bind(updated.is_active)
            .bind(updated.max_volunteers)
            .bind(&updated.updated_at)
            .bind(id)
            .bind(&previous_updated_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                tracing::info!(opportunity_id = %id, "Updated opportunity");
                return Ok(updated);
            }

            tracing::debug!(opportunity_id = %id, "Update raced, merging again");
        }

        Err(modified_concurrently(id))
    }

    /// Delete an opportunity. Deleting a missing id is not an error here.
    pub async fn delete_opportunity(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM opportunities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            opportunity_id = %id,
            removed = result.rows_affected(),
            "Deleted opportunity"
        );
        Ok(())
    }

    /// Flip the active flag.
    ///
    /// The write is conditional on the flag value that was read, so a
    /// concurrent toggle makes this one fail with a conflict instead of
    /// leaving an arbitrary final state.
    pub async fn toggle_opportunity_active(&self, id: &str) -> Result<Opportunity, AppError> {
        let seen = self
            .get_opportunity(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        self.toggle_from(seen).await
    }

    /// Write the negation of `seen.is_active`. Writes that leave the flag
    /// alone only force a re-read; a changed flag is a conflict.
    async fn toggle_from(&self, seen: Opportunity) -> Result<Opportunity, AppError> {
        let id = seen.opportunity_id.clone();
        let expected = seen.is_active;
        let is_active = !expected;
        let mut current = seen;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            if current.is_active != expected {
                tracing::warn!(opportunity_id = %id, "Concurrent toggle detected");
                return Err(modified_concurrently(&id));
            }

            let updated_at = next_timestamp(&current.updated_at);

            let result = sqlx::query(
                r#"UPDATE opportunities SET is_active = ?, updated_at = ?
                   WHERE id = ? AND is_active = ? AND updated_at = ?"#,
            )
            .bind(is_active)
            .bind(&updated_at)
            .bind(&id)
            .bind(expected)
            .bind(&current.updated_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                tracing::info!(opportunity_id = %id, is_active, "Toggled opportunity");
                return Ok(Opportunity {
                    is_active,
                    updated_at,
                    ..current
                });
            }

            current = self
                .get_opportunity(&id)
                .await?
                .ok_or_else(|| not_found(&id))?;
        }

        Err(modified_concurrently(&id))
    }

    /// Add one volunteer, refusing when capacity is reached.
    pub async fn increment_volunteer_count(&self, id: &str) -> Result<Opportunity, AppError> {
        self.step_volunteer_count(id, INCREMENT_VOLUNTEERS_SQL, |existing| {
            match existing.max_volunteers {
                Some(max) if existing.current_volunteers >= max => {
                    tracing::warn!(opportunity_id = %id, "Opportunity is at capacity");
                    Some(AppError::Conflict(format!("Opportunity {} is already full", id)))
                }
                _ => None,
            }
        })
        .await
    }

    /// Remove one volunteer. The count never goes below zero.
    pub async fn decrement_volunteer_count(&self, id: &str) -> Result<Opportunity, AppError> {
        self.step_volunteer_count(id, DECREMENT_VOLUNTEERS_SQL, |existing| {
            if existing.current_volunteers <= 0 {
                tracing::warn!(opportunity_id = %id, "Volunteer count already zero");
                Some(AppError::Conflict(format!("Opportunity {} has no volunteers", id)))
            } else {
                None
            }
        })
        .await
    }

    /// Run a single-statement counter write guarded on the `updated_at` that
    /// was read, so the new timestamp is always past the previous one.
    /// A concurrent writer makes the statement match nothing and the step is
    /// retried against the fresh row.
    async fn step_volunteer_count<F>(
        &self,
        id: &str,
        sql: &str,
        refuse: F,
    ) -> Result<Opportunity, AppError>
    where
        F: Fn(&Opportunity) -> Option<AppError>,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let existing = self
                .get_opportunity(id)
                .await?
                .ok_or_else(|| not_found(id))?;

            if let Some(err) = refuse(&existing) {
                return Err(err);
            }

            let row = sqlx::query(sql)
                .bind(next_timestamp(&existing.updated_at))
                .bind(id)
                .bind(&existing.updated_at)
                .fetch_optional(&self.pool)
                .await?;

            if let Some(row) = row {
                let updated = opportunity_from_row(&row)?;
                tracing::info!(
                    opportunity_id = %id,
                    current_volunteers = updated.current_volunteers,
                    "Adjusted volunteer count"
                );
                return Ok(updated);
            }

            tracing::debug!(opportunity_id = %id, "Counter write raced, retrying");
        }

        tracing::warn!(opportunity_id = %id, "Counter write kept racing");
        Err(modified_concurrently(id))
    }

    /// Aggregate counts, reduced from a full listing.
    pub async fn get_stats(&self) -> Result<OpportunityStats, AppError> {
        let opportunities = self.list_opportunities().await?;
        Ok(OpportunityStats::from_opportunities(&opportunities))
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Opportunity {} not found", id))
}

fn modified_concurrently(id: &str) -> AppError {
    AppError::Conflict(format!("Opportunity {} was modified concurrently", id))
}

// Helper functions for row conversion

fn opportunities_from_rows(rows: &[SqliteRow]) -> Result<Vec<Opportunity>, AppError> {
    rows.iter().map(opportunity_from_row).collect()
}

fn opportunity_from_row(row: &SqliteRow) -> Result<Opportunity, AppError> {
    let requirements: String = row.try_get("requirements")?;
    let benefits: String = row.try_get("benefits")?;
    let is_active: i64 = row.try_get("is_active")?;

    Ok(Opportunity {
        opportunity_id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        location: row.try_get("location")?,
        time_commitment: row.try_get("time_commitment")?,
        description: row.try_get("description")?,
        requirements: parse_json_array(&requirements)?,
        benefits: parse_json_array(&benefits)?,
        is_active: is_active != 0,
        max_volunteers: row.try_get("max_volunteers")?,
        current_volunteers: row.try_get("current_volunteers")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_json_array(s: &str) -> Result<Vec<String>, AppError> {
    Ok(serde_json::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("repo.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn request(title: &str, category: &str) -> CreateOpportunityRequest {
        CreateOpportunityRequest {
            title: title.to_string(),
            category: category.to_string(),
            location: "Community Hall".to_string(),
            time_commitment: "4 hours/week".to_string(),
            description: format!("{} volunteer", title),
            ..Default::default()
        }
    }

    fn update(value: serde_json::Value) -> UpdateOpportunityRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (repo, _dir) = test_repo().await;

        let created = repo
            .create_opportunity(&request("Driver", "Transport"))
            .await
            .unwrap();

        assert!(!created.opportunity_id.is_empty());
        assert!(created.is_active);
        assert_eq!(created.current_volunteers, 0);
        assert!(created.requirements.is_empty());
        assert!(created.benefits.is_empty());
        assert_eq!(created.created_at, created.updated_at);

        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_generates_unique_ids() {
        let (repo, _dir) = test_repo().await;

        let a = repo.create_opportunity(&request("A", "X")).await.unwrap();
        let b = repo.create_opportunity(&request("B", "X")).await.unwrap();

        assert_ne!(a.opportunity_id, b.opportunity_id);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (repo, _dir) = test_repo().await;
        assert!(repo.get_opportunity("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Tutor", "Education"))
            .await
            .unwrap();

        let updated = repo
            .update_opportunity(
                &created.opportunity_id,
                &update(json!({ "location": "Library", "requirements": ["Patience"] })),
            )
            .await
            .unwrap();

        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, updated);
        assert_eq!(fetched.location, "Library");
        assert_eq!(fetched.requirements, vec!["Patience"]);
        assert_eq!(fetched.title, "Tutor");
        assert_eq!(fetched.created_at, created.created_at);
        assert!(fetched.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn test_update_rejects_identifier_change() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Tutor", "Education"))
            .await
            .unwrap();

        let result = repo
            .update_opportunity(
                &created.opportunity_id,
                &update(json!({ "opportunityId": "new-id" })),
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(repo.get_opportunity("new-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_empty_payload() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Tutor", "Education"))
            .await
            .unwrap();

        let result = repo
            .update_opportunity(&created.opportunity_id, &update(json!({})))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (repo, _dir) = test_repo().await;

        let result = repo
            .update_opportunity("missing", &update(json!({ "title": "New" })))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_flag() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Greeter", "Events"))
            .await
            .unwrap();

        let once = repo
            .toggle_opportunity_active(&created.opportunity_id)
            .await
            .unwrap();
        assert!(!once.is_active);

        let twice = repo
            .toggle_opportunity_active(&created.opportunity_id)
            .await
            .unwrap();
        assert!(twice.is_active);
        assert!(twice.updated_at > once.updated_at);
    }

    #[tokio::test]
    async fn test_toggle_missing_is_not_found() {
        let (repo, _dir) = test_repo().await;
        let result = repo.toggle_opportunity_active("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_increment_then_decrement_restores_count() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Cook", "Kitchen"))
            .await
            .unwrap();
        let id = &created.opportunity_id;

        assert_eq!(
            repo.increment_volunteer_count(id)
                .await
                .unwrap()
                .current_volunteers,
            1
        );
        assert_eq!(
            repo.decrement_volunteer_count(id)
                .await
                .unwrap()
                .current_volunteers,
            0
        );
    }

    #[tokio::test]
    async fn test_decrement_at_zero_is_refused() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Cook", "Kitchen"))
            .await
            .unwrap();

        let result = repo.decrement_volunteer_count(&created.opportunity_id).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.current_volunteers, 0);
    }

    #[tokio::test]
    async fn test_increment_respects_capacity() {
        let (repo, _dir) = test_repo().await;
        let mut req = request("Usher", "Events");
        req.max_volunteers = Some(1);
        let created = repo.create_opportunity(&req).await.unwrap();

        repo.increment_volunteer_count(&created.opportunity_id)
            .await
            .unwrap();
        let result = repo.increment_volunteer_count(&created.opportunity_id).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_counter_operations_on_missing_id() {
        let (repo, _dir) = test_repo().await;
        assert!(matches!(
            repo.increment_volunteer_count("missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.decrement_volunteer_count("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Runner", "Events"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo = repo.clone();
                let id = created.opportunity_id.clone();
                tokio::spawn(async move { repo.increment_volunteer_count(&id).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.current_volunteers, 10);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_none() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Painter", "Maintenance"))
            .await
            .unwrap();

        repo.delete_opportunity(&created.opportunity_id)
            .await
            .unwrap();

        assert!(repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .is_none());
        // A second delete is not distinguished
        repo.delete_opportunity(&created.opportunity_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_coordinator_scenario() {
        let (repo, _dir) = test_repo().await;
        let mut req = request("Event Coordinator", "Events");
        req.max_volunteers = Some(5);

        let created = repo.create_opportunity(&req).await.unwrap();
        let id = created.opportunity_id.clone();
        assert_eq!(created.current_volunteers, 0);
        assert!(created.is_active);

        for _ in 0..3 {
            repo.increment_volunteer_count(&id).await.unwrap();
        }
        let fetched = repo.get_opportunity(&id).await.unwrap().unwrap();
        assert_eq!(fetched.current_volunteers, 3);

        let active = repo.list_active_opportunities().await.unwrap();
        assert!(active.iter().any(|o| o.opportunity_id == id));

        let toggled = repo.toggle_opportunity_active(&id).await.unwrap();
        assert!(!toggled.is_active);

        let active = repo.list_active_opportunities().await.unwrap();
        assert!(!active.iter().any(|o| o.opportunity_id == id));
    }

    #[tokio::test]
    async fn test_listings_filter_and_order() {
        let (repo, _dir) = test_repo().await;
        let first = repo
            .create_opportunity(&request("First", "Events"))
            .await
            .unwrap();
        let second = repo
            .create_opportunity(&request("Second", "Education"))
            .await
            .unwrap();
        let third = repo
            .create_opportunity(&request("Third", "Events"))
            .await
            .unwrap();
        repo.toggle_opportunity_active(&third.opportunity_id)
            .await
            .unwrap();

        let all = repo.list_opportunities().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|o| o.opportunity_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                third.opportunity_id.as_str(),
                second.opportunity_id.as_str(),
                first.opportunity_id.as_str()
            ]
        );

        let active = repo.list_active_opportunities().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].opportunity_id, second.opportunity_id);

        let events = repo.list_opportunities_by_category("Events").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].opportunity_id, first.opportunity_id);

        assert!(repo
            .list_opportunities_by_category("events")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats_over_mixed_table() {
        let (repo, _dir) = test_repo().await;
        for (title, category) in [
            ("A", "Events"),
            ("B", "Education"),
            ("C", "Events"),
            ("D", "Outreach"),
            ("E", "Kitchen"),
        ] {
            let created = repo
                .create_opportunity(&request(title, category))
                .await
                .unwrap();
            if title == "D" || title == "E" {
                repo.toggle_opportunity_active(&created.opportunity_id)
                    .await
                    .unwrap();
            }
        }

        let stats = repo.get_stats().await.unwrap();

        assert_eq!(stats.total, 5);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.inactive, 2);
        assert_eq!(
            stats.categories,
            vec!["Education", "Events", "Kitchen", "Outreach"]
        );
    }

    async fn set_column(repo: &Repository, id: &str, column: &str, value: &str) {
        sqlx::query(&format!("UPDATE opportunities SET {} = ? WHERE id = ?", column))
            .bind(value)
            .bind(id)
            .execute(&repo.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_counter_writes_never_move_updated_at_backwards() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Greeter", "Events"))
            .await
            .unwrap();
        let id = created.opportunity_id.as_str();
        let future = "2999-01-01T00:00:00.000000Z";
        set_column(&repo, id, "updated_at", future).await;

        let toggled = repo.toggle_opportunity_active(id).await.unwrap();
        assert!(toggled.updated_at.as_str() > future);

        let incremented = repo.increment_volunteer_count(id).await.unwrap();
        assert!(incremented.updated_at > toggled.updated_at);
        assert_eq!(incremented.current_volunteers, 1);

        let decremented = repo.decrement_volunteer_count(id).await.unwrap();
        assert!(decremented.updated_at > incremented.updated_at);
        assert_eq!(decremented.current_volunteers, 0);

        let updated = repo
            .update_opportunity(id, &update(json!({"title": "Host"})))
            .await
            .unwrap();
        assert!(updated.updated_at > decremented.updated_at);

        let fetched = repo.get_opportunity(id).await.unwrap().unwrap();
        assert_eq!(fetched.updated_at, updated.updated_at);
    }

    #[tokio::test]
    async fn test_toggle_from_stale_flag_conflicts() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Steward", "Events"))
            .await
            .unwrap();
        let stale = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();

        repo.toggle_opportunity_active(&created.opportunity_id)
            .await
            .unwrap();
        let result = repo.toggle_from(stale).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!fetched.is_active);
    }

    #[tokio::test]
    async fn test_toggle_after_counter_write_still_flips() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Marshal", "Events"))
            .await
            .unwrap();
        let stale = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();

        let incremented = repo
            .increment_volunteer_count(&created.opportunity_id)
            .await
            .unwrap();
        let toggled = repo.toggle_from(stale).await.unwrap();

        assert!(!toggled.is_active);
        assert_eq!(toggled.current_volunteers, 1);
        assert!(toggled.updated_at > incremented.updated_at);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_match_successes() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Runner", "Events"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let repo = repo.clone();
                let id = created.opportunity_id.clone();
                tokio::spawn(async move { repo.toggle_opportunity_active(&id).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected toggle error: {:?}", other),
            }
        }

        assert!(successes >= 1);
        let fetched = repo
            .get_opportunity(&created.opportunity_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.is_active, successes % 2 == 0);
    }

    #[tokio::test]
    async fn test_update_refuses_capacity_below_current_count() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Tutor", "Education"))
            .await
            .unwrap();
        let id = created.opportunity_id.as_str();
        repo.increment_volunteer_count(id).await.unwrap();
        repo.increment_volunteer_count(id).await.unwrap();

        let result = repo
            .update_opportunity(id, &update(json!({"maxVolunteers": 1})))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let updated = repo
            .update_opportunity(id, &update(json!({"maxVolunteers": 2})))
            .await
            .unwrap();
        assert_eq!(updated.max_volunteers, Some(2));
    }

    #[tokio::test]
    async fn test_corrupt_list_column_is_an_error() {
        let (repo, _dir) = test_repo().await;
        let created = repo
            .create_opportunity(&request("Cook", "Kitchen"))
            .await
            .unwrap();
        set_column(&repo, &created.opportunity_id, "requirements", "not json").await;

        let result = repo.get_opportunity(&created.opportunity_id).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(matches!(
            repo.list_opportunities().await,
            Err(AppError::Internal(_))
        ));
    }
}
