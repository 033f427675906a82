use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use rise_core::domain::conversation::{Conversation, SessionId};
use rise_core::domain::equipment::{Equipment, EquipmentId, NewEquipment};
use rise_core::domain::equipment_request::{EquipmentRequest, NewEquipmentRequest};
use rise_core::domain::labour::{Labour, LabourId, NewLabour};
use rise_core::domain::project::{NewProjectRequest, ProjectRequest, ProjectRequestId};
use rise_core::domain::status::RequestStatus;

pub mod checkpoint;
pub mod details;
pub mod equipment;
pub mod equipment_request;
pub mod labour;
pub mod memory;
pub mod project;

pub use checkpoint::SqlCheckpointRepository;
pub use details::{QueryRows, SqlReadOnlyQuery};
pub use equipment::SqlEquipmentRepository;
pub use equipment_request::SqlEquipmentRequestRepository;
pub use labour::SqlLabourRepository;
pub use memory::InMemoryCheckpointRepository;
pub use project::SqlProjectRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("access denied: {0}")]
    Forbidden(String),
}

/// Result of trying to hire a piece of equipment by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EquipmentPlacement {
    Placed { equipment: Equipment, request: EquipmentRequest },
    NotFound,
    Unavailable(Equipment),
}

/// Result of moving a project request through its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusChange {
    Applied(ProjectRequest),
    NotFound,
    Refused { current: RequestStatus },
}

#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn list(&self, limit: u32) -> Result<Vec<Equipment>, RepositoryError>;
    /// Case-insensitive lookup on the display name; the oldest match wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<Equipment>, RepositoryError>;
    async fn create(&self, equipment: NewEquipment) -> Result<Equipment, RepositoryError>;
    async fn delete(&self, id: EquipmentId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait LabourRepository: Send + Sync {
    async fn list(&self, limit: u32) -> Result<Vec<Labour>, RepositoryError>;
    async fn create(&self, labour: NewLabour) -> Result<Labour, RepositoryError>;
    async fn delete(&self, id: LabourId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProjectRequestRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: ProjectRequestId,
    ) -> Result<Option<ProjectRequest>, RepositoryError>;
    async fn list(
        &self,
        status: Option<RequestStatus>,
        limit: u32,
    ) -> Result<Vec<ProjectRequest>, RepositoryError>;
    async fn create(&self, project: NewProjectRequest) -> Result<ProjectRequest, RepositoryError>;
    /// Reads, checks and writes the status in one transaction.
    async fn change_status(
        &self,
        id: ProjectRequestId,
        next: RequestStatus,
    ) -> Result<StatusChange, RepositoryError>;
    async fn delete(&self, id: ProjectRequestId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait EquipmentRequestRepository: Send + Sync {
    async fn place(
        &self,
        request: NewEquipmentRequest,
    ) -> Result<EquipmentPlacement, RepositoryError>;
    async fn list_for_equipment(
        &self,
        equipment_id: EquipmentId,
    ) -> Result<Vec<EquipmentRequest>, RepositoryError>;
}

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Conversation>, RepositoryError>;
    async fn save(&self, conversation: &Conversation) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ReadOnlyQueryRepository: Send + Sync {
    /// `CREATE TABLE` text for the business tables a lookup may read.
    async fn schema_summary(&self) -> Result<String, RepositoryError>;
    /// Runs one already-guarded statement inside a transaction that is always
    /// rolled back, returning at most `row_limit` rows.
    async fn run(&self, sql: &str, row_limit: u32) -> Result<QueryRows, RepositoryError>;
}

pub(crate) fn decimal_to_cents(value: Decimal) -> Result<i64, RepositoryError> {
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.round().to_i64())
        .ok_or_else(|| RepositoryError::InvalidValue(format!("amount `{value}` is out of range")))
}

pub(crate) fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid date `{raw}`: {error}")))
}

pub(crate) fn parse_status(raw: &str) -> Result<RequestStatus, RepositoryError> {
    raw.parse::<RequestStatus>().map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn to_u32(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} value {value} is out of range")))
}
