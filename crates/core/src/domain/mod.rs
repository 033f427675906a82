pub mod conversation;
pub mod equipment;
pub mod equipment_request;
pub mod labour;
pub mod project;
pub mod role;
pub mod status;
