//! Workflow template definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stage a template automates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCategory {
    Onboarding,
    ScriptPipeline,
    RateNegotiation,
    ProductShipment,
    ContractSigning,
    ContentDelivery,
}

impl WorkflowCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "onboarding",
            Self::ScriptPipeline => "script_pipeline",
            Self::RateNegotiation => "rate_negotiation",
            Self::ProductShipment => "product_shipment",
            Self::ContractSigning => "contract_signing",
            Self::ContentDelivery => "content_delivery",
        }
    }
}

impl std::fmt::Display for WorkflowCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding" => Ok(Self::Onboarding),
            "script_pipeline" => Ok(Self::ScriptPipeline),
            "rate_negotiation" => Ok(Self::RateNegotiation),
            "product_shipment" => Ok(Self::ProductShipment),
            "contract_signing" => Ok(Self::ContractSigning),
            "content_delivery" => Ok(Self::ContentDelivery),
            other => Err(format!("unknown workflow category: {other}")),
        }
    }
}

/// Event that starts executions of matching templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A creator was added to the brand's roster
    CreatorCreated,

    /// A creator's pipeline status changed
    StatusChanged,

    /// Started by a person from the dashboard
    Manual,
}

impl TriggerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatorCreated => "creator_created",
            Self::StatusChanged => "status_changed",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creator_created" => Ok(Self::CreatorCreated),
            "status_changed" => Ok(Self::StatusChanged),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown trigger event: {other}")),
        }
    }
}

/// A brand-owned workflow definition
///
/// Templates are read-only to the engine. Once an execution references a
/// template, only `is_active` may change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: WorkflowCategory,
    pub trigger_event: TriggerEvent,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    /// Create an active template with fresh timestamps
    pub fn new(
        brand_id: Uuid,
        name: impl Into<String>,
        category: WorkflowCategory,
        trigger_event: TriggerEvent,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            brand_id,
            name: name.into(),
            description: None,
            category,
            trigger_event,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in [
            WorkflowCategory::Onboarding,
            WorkflowCategory::ScriptPipeline,
            WorkflowCategory::RateNegotiation,
            WorkflowCategory::ProductShipment,
            WorkflowCategory::ContractSigning,
            WorkflowCategory::ContentDelivery,
        ] {
            assert_eq!(category.as_str().parse::<WorkflowCategory>(), Ok(category));
        }
    }

    #[test]
    fn test_trigger_event_serialization() {
        let json = serde_json::to_string(&TriggerEvent::CreatorCreated).unwrap();
        assert_eq!(json, "\"creator_created\"");
        assert!("unknown".parse::<TriggerEvent>().is_err());
    }
}
