// Shared fixtures for server tests

use std::sync::Arc;

use creatorflow_engine::action::{builtin_actions, Collaborators};
use creatorflow_engine::model::{
    BrandProfile, CreatorProfile, StepConfig, TriggerEvent, WaitStepConfig, WaitUnit,
    WorkflowCategory, WorkflowStep, WorkflowTemplate,
};
use creatorflow_engine::persistence::{InMemoryStore, WorkflowStore};
use creatorflow_engine::WorkflowEngine;
use serde_json::json;

use crate::Engine;

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub engine: Arc<Engine>,
    pub brand: BrandProfile,
    pub creator: CreatorProfile,
    /// Sets a status, then waits on a review
    pub review_template: WorkflowTemplate,
    /// Waits an hour, then sets a status
    pub wait_template: WorkflowTemplate,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let brand = BrandProfile::new("Glow Labs");
        let creator = CreatorProfile::new(brand.id, "Jamie Rivera", "jamie@example.test");

        let review_template = WorkflowTemplate::new(
            brand.id,
            "Onboarding",
            WorkflowCategory::Onboarding,
            TriggerEvent::CreatorCreated,
        );
        let wait_template = WorkflowTemplate::new(
            brand.id,
            "Follow up",
            WorkflowCategory::Onboarding,
            TriggerEvent::Manual,
        );

        store.insert_steps([
            WorkflowStep::new(
                review_template.id,
                1,
                "Set status",
                StepConfig::action("update_status", json!({"status": "Cold Outreach"})),
            ),
            WorkflowStep::new(
                review_template.id,
                2,
                "Review",
                StepConfig::human_intervention("Portfolio Review"),
            ),
            WorkflowStep::new(
                wait_template.id,
                1,
                "Wait an hour",
                StepConfig::Wait(WaitStepConfig::for_duration(1, WaitUnit::Hours)),
            ),
            WorkflowStep::new(
                wait_template.id,
                2,
                "Set status",
                StepConfig::action("update_status", json!({"status": "Followed Up"})),
            ),
        ]);
        store.insert_template(review_template.clone());
        store.insert_template(wait_template.clone());
        store.insert_brand(brand.clone());
        store.insert_creator(creator.clone());

        let actions = builtin_actions(store.clone(), &Collaborators::recording());
        let dyn_store: Arc<dyn WorkflowStore> = store.clone();
        let engine = Arc::new(WorkflowEngine::new(dyn_store, actions));

        Self {
            store,
            engine,
            brand,
            creator,
            review_template,
            wait_template,
        }
    }
}
