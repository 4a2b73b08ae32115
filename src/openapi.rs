use crate::exercises::{Difficulty, Exercise, ExerciseCategory};
use crate::models::{
    ActivityLog, ActivityLogFields, AnalyticsPayload, Injury, InjuryStatus, NewActivityLog, NewInjury, NewPainEntry,
    PainEntry, PainMarker, PainType, Point, SubscribeRequest,
};
use crate::selector::{BodyPart, Side, View};
use crate::validation::FieldIssue;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_pain_entries,
        crate::routes::get_pain_entry,
        crate::routes::create_pain_entry,
        crate::routes::list_activity_logs,
        crate::routes::create_activity_log,
        crate::routes::update_activity_log,
        crate::routes::delete_activity_log,
        crate::routes::get_activity_log_by_date,
        crate::routes::upsert_activity_log,
        crate::routes::list_injuries,
        crate::routes::create_injury,
        crate::routes::get_injury,
        crate::routes::update_injury,
        crate::routes::delete_injury,
        crate::routes::list_exercises,
        crate::routes::list_exercise_categories,
        crate::routes::list_body_parts,
        crate::routes::resolve_body_part,
        crate::routes::subscribe,
        crate::routes::verify_subscription,
        crate::routes::record_analytics,
    ),
    components(schemas(
        PainEntry, NewPainEntry, PainMarker, PainType, Point,
        ActivityLog, NewActivityLog, ActivityLogFields,
        Injury, NewInjury, InjuryStatus,
        Exercise, ExerciseCategory, Difficulty,
        BodyPart, Side, View,
        SubscribeRequest, AnalyticsPayload, FieldIssue,
        crate::routes::SuccessResponse, crate::routes::MessageResponse,
        crate::routes::ResolveBodyPartRequest, crate::routes::ResolvedBodyPart,
    )),
    tags(
        (name = "pain-entries", description = "Annotated pain images"),
        (name = "activity-logs", description = "Daily self reports"),
        (name = "injuries", description = "Tracked conditions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn params(doc: &Value, path: &str) -> Vec<(String, String)> {
        doc["paths"][path]["get"]["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| (p["name"].as_str().unwrap().to_string(), p["in"].as_str().unwrap().to_string()))
            .collect()
    }

    #[test]
    fn filters_are_query_parameters() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(params(&doc, "/api/injuries"), vec![("userId".to_string(), "query".to_string())]);
        assert_eq!(params(&doc, "/api/exercises"), vec![("category".to_string(), "query".to_string())]);
    }

    #[test]
    fn ids_stay_path_parameters() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert_eq!(params(&doc, "/api/pain-entries/{id}"), vec![("id".to_string(), "path".to_string())]);
    }
}
