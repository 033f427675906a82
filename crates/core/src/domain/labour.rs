use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabourId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labour {
    pub id: LabourId,
    pub name: String,
    /// Comma separated trades, e.g. "Mason, Electrician".
    pub skillset: Option<String>,
    pub hourly_rate: Decimal,
    pub available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLabour {
    pub name: String,
    pub skillset: Option<String>,
    pub hourly_rate: Decimal,
}
