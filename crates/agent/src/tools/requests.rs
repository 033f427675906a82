use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use rise_core::domain::equipment_request::NewEquipmentRequest;
use rise_core::domain::project::NewProjectRequest;
use rise_db::repositories::{
    EquipmentPlacement, EquipmentRequestRepository, ProjectRequestRepository,
};

use super::fields::{iso_date, optional_text, positive_count, required_text};
use super::{names, SideEffect, Tool, ToolContext, ToolFailure, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlaceRequestForProjectArgs {
    /// Short title of the project.
    pub title: String,
    /// What the caller needs built or done.
    pub description: String,
    /// Site where the work takes place.
    #[serde(default)]
    pub location: Option<String>,
    /// Requested start date, `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
}

pub struct PlaceRequestForProjectTool {
    projects: Arc<dyn ProjectRequestRepository>,
}

impl PlaceRequestForProjectTool {
    pub fn new(projects: Arc<dyn ProjectRequestRepository>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl Tool for PlaceRequestForProjectTool {
    type Args = PlaceRequestForProjectArgs;
    type Input = NewProjectRequest;

    const NAME: &'static str = names::PLACE_REQUEST_FOR_PROJECT;
    const DESCRIPTION: &'static str =
        "Saves a project request with the given title, description, location and start date. \
         The request starts out pending until an admin decides it.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        let start_date = match optional_text(args.start_date) {
            Some(raw) => Some(iso_date("start_date", &raw)?),
            None => None,
        };
        Ok(NewProjectRequest {
            title: required_text("title", args.title)?,
            description: required_text("description", args.description)?,
            location: optional_text(args.location),
            start_date,
        })
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let project = self.projects.create(input).await?;
        Ok(ToolOutcome::Success(format!(
            "Booking placed successfully (project request #{}).",
            project.id.0
        )))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PlaceRequestForEquipmentArgs {
    /// Name of the equipment to hire, as listed in the catalog.
    pub equipment_name: String,
    /// Number of days the equipment is needed for.
    #[serde(default = "one", alias = "number_of_dates")]
    pub number_of_days: i64,
    /// How many units are needed.
    #[serde(default = "one")]
    pub quantity: i64,
    /// Where the equipment should be delivered.
    pub location: String,
    /// First day of hire, `YYYY-MM-DD`.
    pub start_date: String,
}

fn one() -> i64 {
    1
}

pub struct PlaceRequestForEquipmentTool {
    requests: Arc<dyn EquipmentRequestRepository>,
}

impl PlaceRequestForEquipmentTool {
    pub fn new(requests: Arc<dyn EquipmentRequestRepository>) -> Self {
        Self { requests }
    }
}

#[async_trait]
impl Tool for PlaceRequestForEquipmentTool {
    type Args = PlaceRequestForEquipmentArgs;
    type Input = NewEquipmentRequest;

    const NAME: &'static str = names::PLACE_REQUEST_FOR_EQUIPMENT;
    const DESCRIPTION: &'static str =
        "Requests to hire the named equipment for a number of days at a location, starting on \
         the given date. Fails when the equipment is unknown or currently unavailable.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        Ok(NewEquipmentRequest {
            equipment_name: required_text("equipment_name", args.equipment_name)?,
            location: required_text("location", args.location)?,
            start_date: iso_date("start_date", &args.start_date)?,
            number_of_days: positive_count("number_of_days", args.number_of_days)?,
            quantity: positive_count("quantity", args.quantity)?,
        })
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let name = input.equipment_name.clone();
        let outcome = match self.requests.place(input).await? {
            EquipmentPlacement::Placed { request, .. } => ToolOutcome::Success(format!(
                "Equipment {name} request placed successfully (request #{}).",
                request.id.0
            )),
            EquipmentPlacement::NotFound => {
                ToolOutcome::Rejected(format!("Equipment {name} not found."))
            }
            EquipmentPlacement::Unavailable(_) => {
                ToolOutcome::Rejected(format!("Equipment {name} is currently unavailable."))
            }
        };
        Ok(outcome)
    }
}
