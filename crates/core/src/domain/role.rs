use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Caller tier. Capabilities are strictly nested: `SuperAdmin` ⊇ `Admin` ⊇ `User`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    User,
    Admin,
    SuperAdmin,
}

impl StaffRole {
    pub const ALL: [StaffRole; 3] = [Self::User, Self::Admin, Self::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for StaffRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StaffRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}
