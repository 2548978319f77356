use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::checkin::require_identity;
use crate::error::ApiError;
use crate::models::{NewResourceInteraction, ResourceInteraction};
use crate::store::RecordStore;

pub const RESOURCE_TYPE: &str = "wellness_tool";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WellnessResource {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub static DIRECTORY: [WellnessResource; 6] = [
    WellnessResource {
        id: "breathing-exercise",
        title: "Breathing Exercise",
        description: "5-minute guided breathing to reduce stress",
    },
    WellnessResource {
        id: "mindfulness",
        title: "Mindfulness",
        description: "Quick meditation for mental clarity",
    },
    WellnessResource {
        id: "positive-affirmations",
        title: "Positive Affirmations",
        description: "Daily encouragement and motivation",
    },
    WellnessResource {
        id: "sleep-hygiene",
        title: "Sleep Hygiene",
        description: "Tips for better rest and recovery",
    },
    WellnessResource {
        id: "energy-boost",
        title: "Energy Boost",
        description: "Quick exercises to increase vitality",
    },
    WellnessResource {
        id: "connect-and-share",
        title: "Connect & Share",
        description: "Anonymous peer support community",
    },
];

pub fn find(id: &str) -> Option<&'static WellnessResource> {
    DIRECTORY.iter().find(|r| r.id == id)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: Option<Uuid>,
    #[serde(default, alias = "session_id")]
    pub session_id: Option<String>,
    #[serde(alias = "interaction_type")]
    pub interaction_type: String,
}

pub async fn record_interaction(
    store: &Arc<dyn RecordStore>,
    resource_id: &str,
    request: InteractionRequest,
) -> Result<ResourceInteraction, ApiError> {
    let resource = find(resource_id)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown resource: {resource_id}")))?;
    let identity = require_identity(request.user_id, request.session_id.as_deref())?;
    if request.interaction_type.trim().is_empty() {
        return Err(ApiError::BadRequest("interactionType is required".to_string()));
    }

    let interaction = store
        .insert_resource_interaction(NewResourceInteraction {
            identity,
            resource_type: RESOURCE_TYPE.to_string(),
            resource_id: resource.id.to_string(),
            interaction_type: request.interaction_type,
            created_at: Utc::now(),
        })
        .await?;

    info!(
        resource_id = resource.id,
        interaction_type = %interaction.interaction_type,
        "resource interaction recorded"
    );
    Ok(interaction)
}
