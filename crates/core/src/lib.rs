pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use domain::conversation::{ChatMessage, Conversation, SessionId, ToolCall};
pub use domain::equipment::{Equipment, EquipmentId, NewEquipment};
pub use domain::equipment_request::{EquipmentRequest, EquipmentRequestId, NewEquipmentRequest};
pub use domain::labour::{Labour, LabourId, NewLabour};
pub use domain::project::{NewProjectRequest, ProjectHistory, ProjectRequest, ProjectRequestId};
pub use domain::role::StaffRole;
pub use domain::status::RequestStatus;
pub use errors::{ApplicationError, DomainError, InterfaceError};
