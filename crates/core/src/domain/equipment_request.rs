use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::equipment::EquipmentId;
use crate::domain::status::RequestStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquipmentRequestId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRequest {
    pub id: EquipmentRequestId,
    pub equipment_id: EquipmentId,
    pub location: String,
    pub start_date: NaiveDate,
    pub number_of_days: u32,
    pub quantity: u32,
    pub status: RequestStatus,
}

/// Hire request keyed by the equipment's display name; the store resolves the name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEquipmentRequest {
    pub equipment_name: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub number_of_days: u32,
    pub quantity: u32,
}
