//! Role table: which tools each staff tier may use and how the assistant introduces
//! itself to that tier.

use rise_core::domain::role::StaffRole;

use crate::error::AgentError;
use crate::tools::names;

const USER_TOOLS: &[&str] =
    &[names::GET_DETAILS, names::PLACE_REQUEST_FOR_PROJECT, names::PLACE_REQUEST_FOR_EQUIPMENT];

const ADMIN_TOOLS: &[&str] = &[
    names::GET_DETAILS,
    names::PLACE_REQUEST_FOR_PROJECT,
    names::PLACE_REQUEST_FOR_EQUIPMENT,
    names::ADD_NEW_EQUIPMENT,
    names::ADD_NEW_LABOUR,
    names::APPROVE_OR_REJECT_PROJECT,
];

const SUPER_ADMIN_TOOLS: &[&str] = &[
    names::GET_DETAILS,
    names::PLACE_REQUEST_FOR_PROJECT,
    names::PLACE_REQUEST_FOR_EQUIPMENT,
    names::ADD_NEW_EQUIPMENT,
    names::ADD_NEW_LABOUR,
    names::APPROVE_OR_REJECT_PROJECT,
    names::REMOVE_PROJECT,
    names::REMOVE_EQUIPMENT,
    names::REMOVE_LABOUR,
];

const GUIDELINES: &str = "Guidelines:
- Be professional, helpful, and efficient.
- Explain equipment features, pricing, and rental terms clearly.
- Recommend options that fit the caller's needs and budget.
- Use the tools for every lookup or change; never invent records, ids, or prices.
- If you do not know the answer, do not guess. Instead, say: \"I'm sorry, but I don't have that \
information. Please contact our call agent for further assistance.\"";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolePolicy {
    pub role: StaffRole,
    pub tools: &'static [&'static str],
    pub persona: String,
}

impl RolePolicy {
    pub fn for_role(role: StaffRole) -> Self {
        let (audience, capabilities, tools) = match role {
            StaffRole::User => (
                "a customer-facing user",
                "- View details of equipment, labour, and past projects.\n\
                 - Place requests for projects and equipment.",
                USER_TOOLS,
            ),
            StaffRole::Admin => (
                "an admin",
                "- View details of equipment, labour, and past projects.\n\
                 - Place requests for projects and equipment.\n\
                 - Add new equipment and labour to the system.\n\
                 - Approve or reject project requests.",
                ADMIN_TOOLS,
            ),
            StaffRole::SuperAdmin => (
                "the super admin",
                "- View details of equipment, labour, and past projects.\n\
                 - Place requests for projects and equipment.\n\
                 - Add new equipment and labour to the system.\n\
                 - Approve or reject project requests.\n\
                 - Remove projects, equipment, and labour from the system.",
                SUPER_ADMIN_TOOLS,
            ),
        };

        let persona = format!(
            "You are Friday, the AI assistant for Rise Construction, a construction company \
             offering equipment and labour hire, project booking, and payment. You are talking \
             to {audience} (role: {role}).\n\nCapabilities for this role:\n{capabilities}\n\n\
             {GUIDELINES}"
        );

        Self { role, tools, persona }
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|tool| *tool == tool_name)
    }
}

/// Parses a caller-supplied role string and returns its policy row.
pub fn resolve(role: &str) -> Result<RolePolicy, AgentError> {
    let role = role
        .parse::<StaffRole>()
        .map_err(|_| AgentError::UnknownRole(role.trim().to_string()))?;
    Ok(RolePolicy::for_role(role))
}

#[cfg(test)]
mod tests {
    use rise_core::domain::role::StaffRole;

    use super::{resolve, RolePolicy};
    use crate::error::AgentError;

    #[test]
    fn tiers_are_strictly_nested() {
        let user = RolePolicy::for_role(StaffRole::User);
        let admin = RolePolicy::for_role(StaffRole::Admin);
        let super_admin = RolePolicy::for_role(StaffRole::SuperAdmin);

        assert!(user.tools.iter().all(|tool| admin.allows(tool)));
        assert!(admin.tools.iter().all(|tool| super_admin.allows(tool)));
        assert!(admin.tools.len() > user.tools.len());
        assert!(super_admin.tools.len() > admin.tools.len());
    }

    #[test]
    fn user_cannot_mutate_catalog() {
        let user = resolve("user").expect("user");
        assert_eq!(
            user.tools,
            &["get_details", "place_request_for_project", "place_request_for_equipment"]
        );
        assert!(!user.allows("remove_equipment"));
        assert!(!user.allows("approve_or_reject_project"));
    }

    #[test]
    fn unknown_role_is_rejected_without_default() {
        let error = resolve("guest").expect_err("guest is unknown");
        assert!(matches!(error, AgentError::UnknownRole(ref role) if role == "guest"));
    }

    #[test]
    fn persona_names_assistant_and_tier() {
        let policy = resolve("Super_Admin").expect("super admin");
        assert_eq!(policy.role, StaffRole::SuperAdmin);
        assert!(policy.persona.contains("Friday"));
        assert!(policy.persona.contains("role: super_admin"));
        assert!(policy.persona.contains("do not guess"));
    }
}
