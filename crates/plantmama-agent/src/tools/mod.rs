//! Tools offered to the plant care model.
//!
//! Definitions live next to their implementations; [`definitions`] collects
//! them for the request and [`execute`] dispatches a call by name.

mod care;
mod diagnosis;
mod encyclopedia;
mod user;

use tracing::{debug, trace};

use crate::context::ToolContext;
use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolDefinition, ToolResult};

pub use care::{CareInstructions, FertilizerRecommendation, ToolRecommendation};
pub use diagnosis::{DiagnosisResult, PlantIdentification};
pub use encyclopedia::{PlantInfo, WateringSchedule};
pub use user::PlantRecord;

/// Every tool the agent registers with the model.
pub fn definitions() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(diagnosis::definitions());
    tools.extend(care::definitions());
    tools.extend(encyclopedia::definitions());
    tools.extend(user::definitions());
    tools
}

/// Run one tool call.
///
/// Unknown names yield [`AgentError::ToolNotFound`]; the caller reports any
/// error back to the model as an error result.
pub async fn execute(ctx: &ToolContext<'_>, call: &ToolCall) -> Result<ToolResult> {
    debug!(tool = %call.name, user_id = %ctx.user.id, "Executing tool");
    trace!(arguments = %call.arguments, "Tool arguments");

    match call.name.as_str() {
        "diagnose_plant_photo" => diagnosis::diagnose_plant_photo(ctx, call).await,
        "identify_plant_species" => diagnosis::identify_plant_species(ctx, call).await,
        "generate_care_instructions" => care::generate_care_instructions(ctx, call),
        "recommend_fertilizers" => care::recommend_fertilizers(call),
        "recommend_tools" => care::recommend_tools(call),
        "get_pest_treatment" => care::get_pest_treatment(call),
        "get_plant_encyclopedia" => encyclopedia::get_plant_encyclopedia(ctx, call).await,
        "calculate_watering_schedule" => {
            encyclopedia::calculate_watering_schedule(ctx, call).await
        }
        "add_plant" => user::add_plant(ctx, call),
        "record_care" => user::record_care(ctx, call),
        "save_user_session" => user::save_user_session(ctx, call),
        "get_user_plant_history" => user::get_user_plant_history(ctx, call),
        "schedule_reminder" => user::schedule_reminder(ctx, call),
        "list_reminders" => user::list_reminders(ctx, call),
        _ => Err(AgentError::ToolNotFound(call.name.clone())),
    }
}

/// Required string argument or an [`AgentError::InvalidArguments`].
fn required<'c>(call: &'c ToolCall, key: &str) -> Result<&'c str> {
    call.get_string_arg(key)
        .map_err(|message| AgentError::invalid_args(&call.name, message))
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::Value;
    use tempfile::TempDir;

    use plantmama_core::Settings;
    use plantmama_models::{SessionId, User, UserProfile};
    use plantmama_persistence::DataStore;

    use crate::client::ChatClient;
    use crate::config::ModelConfig;
    use crate::context::{AttachedImage, ToolContext};
    use crate::tool::{ToolCall, ToolResult};

    /// A user with an open session on a temporary store.
    ///
    /// The chat endpoint is unreachable, so model-backed tools take their
    /// failure or fallback paths.
    pub(crate) struct Fixture {
        _dir: TempDir,
        pub store: DataStore,
        pub client: ChatClient,
        pub vision: ModelConfig,
        pub aux: ModelConfig,
        pub user: User,
        pub session_id: SessionId,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let settings = Settings::for_tests(dir.path());
            let store = DataStore::new(&settings.data_dir);
            let user = store.users.get_or_create(31, &UserProfile::default()).unwrap();
            let session_id = store.sessions.current_or_open(&user.id).unwrap().id;
            Self {
                client: ChatClient::new("key", "http://127.0.0.1:1"),
                vision: ModelConfig::vision(&settings),
                aux: ModelConfig::auxiliary(&settings),
                store,
                user,
                session_id,
                _dir: dir,
            }
        }

        pub fn ctx(&self) -> ToolContext<'_> {
            self.ctx_with_image(None)
        }

        pub fn ctx_with_image<'a>(&'a self, image: Option<&'a AttachedImage>) -> ToolContext<'a> {
            ToolContext {
                store: &self.store,
                client: &self.client,
                vision_config: &self.vision,
                aux_config: &self.aux,
                user: &self.user,
                session_id: &self.session_id,
                image,
            }
        }
    }

    pub(crate) fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::with_id("call-1", name, args)
    }

    pub(crate) fn payload(result: &ToolResult) -> Value {
        serde_json::from_str(&result.content).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_definitions_are_unique_objects() {
        let defs = definitions();
        let names: HashSet<_> = defs.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names.len(), defs.len());
        assert_eq!(defs.len(), 14);
        for def in &defs {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[test]
    fn test_required_names() {
        let names: HashSet<_> = definitions().into_iter().map(|d| d.name).collect();
        for name in [
            "diagnose_plant_photo",
            "identify_plant_species",
            "generate_care_instructions",
            "recommend_fertilizers",
            "recommend_tools",
            "save_user_session",
            "get_user_plant_history",
            "schedule_reminder",
        ] {
            assert!(names.contains(name), "missing {}", name);
        }
    }
}
