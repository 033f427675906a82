//! Catalog maintenance: adding and removing equipment and labour.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use rise_core::domain::equipment::{EquipmentId, NewEquipment};
use rise_core::domain::labour::{LabourId, NewLabour};
use rise_db::repositories::{EquipmentRepository, LabourRepository};

use super::fields::{optional_text, positive_amount, record_id, required_text};
use super::{names, SideEffect, Tool, ToolContext, ToolFailure, ToolOutcome};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddNewEquipmentArgs {
    /// Display name of the equipment.
    pub equipment_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Daily hire price.
    pub price_per_day: f64,
}

pub struct AddNewEquipmentTool {
    equipment: Arc<dyn EquipmentRepository>,
}

impl AddNewEquipmentTool {
    pub fn new(equipment: Arc<dyn EquipmentRepository>) -> Self {
        Self { equipment }
    }
}

#[async_trait]
impl Tool for AddNewEquipmentTool {
    type Args = AddNewEquipmentArgs;
    type Input = NewEquipment;

    const NAME: &'static str = names::ADD_NEW_EQUIPMENT;
    const DESCRIPTION: &'static str =
        "Adds a new piece of equipment to the catalog with a name, description and daily price. \
         New equipment is available for hire immediately.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        Ok(NewEquipment {
            name: required_text("equipment_name", args.equipment_name)?,
            description: optional_text(args.description),
            price_per_day: positive_amount("price_per_day", args.price_per_day)?,
        })
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let equipment = self.equipment.create(input).await?;
        Ok(ToolOutcome::Success(format!(
            "Equipment {} added successfully (id {}).",
            equipment.name, equipment.id.0
        )))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddNewLabourArgs {
    /// Worker's full name.
    pub name: String,
    /// Trades the worker covers, comma separated.
    #[serde(default, alias = "skillset")]
    pub skill_set: Option<String>,
    pub hourly_rate: f64,
}

pub struct AddNewLabourTool {
    labour: Arc<dyn LabourRepository>,
}

impl AddNewLabourTool {
    pub fn new(labour: Arc<dyn LabourRepository>) -> Self {
        Self { labour }
    }
}

#[async_trait]
impl Tool for AddNewLabourTool {
    type Args = AddNewLabourArgs;
    type Input = NewLabour;

    const NAME: &'static str = names::ADD_NEW_LABOUR;
    const DESCRIPTION: &'static str =
        "Adds a new worker to the labour pool with their skill set and hourly rate.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        Ok(NewLabour {
            name: required_text("name", args.name)?,
            skillset: optional_text(args.skill_set),
            hourly_rate: positive_amount("hourly_rate", args.hourly_rate)?,
        })
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        let labour = self.labour.create(input).await?;
        Ok(ToolOutcome::Success(format!(
            "Labour {} added successfully (id {}).",
            labour.name, labour.id.0
        )))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveEquipmentArgs {
    pub equipment_id: i64,
}

pub struct RemoveEquipmentTool {
    equipment: Arc<dyn EquipmentRepository>,
}

impl RemoveEquipmentTool {
    pub fn new(equipment: Arc<dyn EquipmentRepository>) -> Self {
        Self { equipment }
    }
}

#[async_trait]
impl Tool for RemoveEquipmentTool {
    type Args = RemoveEquipmentArgs;
    type Input = EquipmentId;

    const NAME: &'static str = names::REMOVE_EQUIPMENT;
    const DESCRIPTION: &'static str =
        "Removes equipment from the catalog by id, together with its hire requests.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        record_id("equipment_id", args.equipment_id).map(EquipmentId)
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        if self.equipment.delete(input).await? {
            Ok(ToolOutcome::Success("Equipment removed successfully".to_string()))
        } else {
            Ok(ToolOutcome::Rejected("Equipment not found".to_string()))
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RemoveLabourArgs {
    pub labour_id: i64,
}

pub struct RemoveLabourTool {
    labour: Arc<dyn LabourRepository>,
}

impl RemoveLabourTool {
    pub fn new(labour: Arc<dyn LabourRepository>) -> Self {
        Self { labour }
    }
}

#[async_trait]
impl Tool for RemoveLabourTool {
    type Args = RemoveLabourArgs;
    type Input = LabourId;

    const NAME: &'static str = names::REMOVE_LABOUR;
    const DESCRIPTION: &'static str = "Removes a worker from the labour pool by id.";
    const SIDE_EFFECT: SideEffect = SideEffect::Mutating;

    fn validate(args: Self::Args) -> Result<Self::Input, String> {
        record_id("labour_id", args.labour_id).map(LabourId)
    }

    async fn execute(
        &self,
        input: Self::Input,
        _context: &ToolContext,
    ) -> Result<ToolOutcome, ToolFailure> {
        if self.labour.delete(input).await? {
            Ok(ToolOutcome::Success("Labour removed successfully".to_string()))
        } else {
            Ok(ToolOutcome::Rejected("Labour not found".to_string()))
        }
    }
}
