use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::status::RequestStatus;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRequestId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub id: ProjectRequestId,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub status: RequestStatus,
}

impl ProjectRequest {
    /// Applies an approve/reject/cancel decision, refusing anything but a legal
    /// lifecycle step.
    pub fn decide(&mut self, decision: RequestStatus) -> Result<(), DomainError> {
        if decision == RequestStatus::Pending {
            return Err(DomainError::InvariantViolation(
                "a project decision cannot return a request to pending".to_string(),
            ));
        }
        self.status.transition_to(decision)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProjectRequest {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
}

/// Completed project record used as reference data for details lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHistory {
    pub description: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub completion_date: NaiveDate,
    pub initial_budget: Decimal,
    pub actual_cost: Decimal,
    pub workers_used: Option<u32>,
}
