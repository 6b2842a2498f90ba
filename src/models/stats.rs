//! Aggregate counts over the opportunity table.

use std::collections::BTreeSet;

use serde::Serialize;

use super::Opportunity;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    /// Distinct categories, sorted.
    pub categories: Vec<String>,
    pub total_categories: usize,
    /// Sum of current volunteer counts across all records.
    pub total_volunteers: i64,
}

impl OpportunityStats {
    pub fn from_opportunities(opportunities: &[Opportunity]) -> Self {
        let active = opportunities.iter().filter(|o| o.is_active).count();
        let categories: Vec<String> = opportunities
            .iter()
            .map(|o| o.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            total: opportunities.len(),
            active,
            inactive: opportunities.len() - active,
            total_categories: categories.len(),
            categories,
            total_volunteers: opportunities.iter().map(|o| o.current_volunteers).sum(),
        }
    }
}
