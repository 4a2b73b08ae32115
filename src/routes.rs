use std::sync::Arc;

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::config::DEFAULT_JSON_LIMIT;
use crate::error::ApiError;
use crate::exercises;
use crate::models::*;
use crate::repo::{RepoError, Repo, SubscribeOutcome};
use crate::selector::{self, Side, View};
use crate::validation::{self, FieldIssue, ValidationError};

pub fn config(cfg: &mut web::ServiceConfig) {
    config_with_limit(DEFAULT_JSON_LIMIT)(cfg)
}

/// Route table with a custom JSON body cap.
pub fn config_with_limit(json_limit: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::scope("/api")
                .app_data(json_config(json_limit))
                .service(web::resource("/health").route(web::get().to(health)))
                .service(
                    web::resource("/pain-entries")
                        .route(web::get().to(list_pain_entries))
                        .route(web::post().to(create_pain_entry)),
                )
                .service(web::resource("/pain-entries/{id}").route(web::get().to(get_pain_entry)))
                .service(
                    web::resource("/activity-logs")
                        .route(web::get().to(list_activity_logs))
                        .route(web::post().to(create_activity_log)),
                )
                .service(
                    web::resource("/activity-logs/date/{date}")
                        .route(web::get().to(get_activity_log_by_date))
                        .route(web::put().to(upsert_activity_log)),
                )
                .service(
                    web::resource("/activity-logs/{id}")
                        .route(web::put().to(update_activity_log))
                        .route(web::delete().to(delete_activity_log)),
                )
                .service(
                    web::resource("/injuries")
                        .route(web::get().to(list_injuries))
                        .route(web::post().to(create_injury)),
                )
                .service(
                    web::resource("/injuries/{id}")
                        .route(web::get().to(get_injury))
                        .route(web::put().to(update_injury))
                        .route(web::delete().to(delete_injury)),
                )
                .service(web::resource("/exercises").route(web::get().to(list_exercises)))
                .service(web::resource("/exercise-categories").route(web::get().to(list_exercise_categories)))
                .service(web::resource("/body-parts").route(web::get().to(list_body_parts)))
                .service(web::resource("/body-parts/resolve").route(web::post().to(resolve_body_part)))
                .service(web::resource("/subscribe").route(web::post().to(subscribe)))
                .service(web::resource("/verify-subscription/{token}").route(web::get().to(verify_subscription)))
                .service(web::resource("/analytics").route(web::post().to(record_analytics))),
        );
    }
}

/// Maps body extraction failures onto the structured 400 (or 413) shape.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default().limit(limit).error_handler(|err, _req| {
        let api = match &err {
            JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => ApiError::PayloadTooLarge,
            JsonPayloadError::Deserialize(e) => ApiError::BadRequest {
                message: "Invalid request body".into(),
                details: vec![FieldIssue { path: "body".into(), message: e.to_string() }],
            },
            other => ApiError::bad_request(other.to_string()),
        };
        InternalError::from_response(err, api.error_response()).into()
    })
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    /// Base for links sent out in verification mail.
    pub public_url: String,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>) -> Self {
        Self { repo, public_url: "http://localhost:5000".into() }
    }
}

fn parse_id(raw: &str) -> Result<Id, ApiError> {
    raw.parse::<Id>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::single("Invalid ID", "id", "must be a positive integer").into())
}

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// ---------------- Pain entries -----------------------

#[utoipa::path(
    get,
    path = "/api/pain-entries",
    responses((status = 200, description = "All pain entries, newest first", body = [PainEntry]))
)]
pub async fn list_pain_entries(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let entries = data.repo.list_pain_entries().await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    get,
    path = "/api/pain-entries/{id}",
    params(("id" = Id, Path, description = "Pain entry id")),
    responses(
        (status = 200, description = "Pain entry", body = PainEntry),
        (status = 400, description = "Non-numeric id"),
        (status = 404, description = "Pain entry not found")
    )
)]
pub async fn get_pain_entry(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let entry = data.repo.get_pain_entry(id).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[utoipa::path(
    post,
    path = "/api/pain-entries",
    request_body = NewPainEntry,
    responses(
        (status = 200, description = "Pain entry created", body = PainEntry),
        (status = 400, description = "Invalid pain entry data")
    )
)]
pub async fn create_pain_entry(
    data: web::Data<AppState>,
    payload: web::Json<NewPainEntry>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    validation::validate_pain_entry(&new)?;
    let entry = data.repo.create_pain_entry(new).await?;
    info!(entry_id = entry.id, markers = entry.pain_markers.len(), "pain entry created");
    Ok(HttpResponse::Ok().json(entry))
}

// ---------------- Activity logs -----------------------

#[utoipa::path(
    get,
    path = "/api/activity-logs",
    responses((status = 200, description = "Activity logs, newest date first", body = [ActivityLog]))
)]
pub async fn list_activity_logs(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let logs = data.repo.list_activity_logs().await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[utoipa::path(
    post,
    path = "/api/activity-logs",
    request_body = NewActivityLog,
    responses(
        (status = 200, description = "Activity log created", body = ActivityLog),
        (status = 400, description = "Invalid activity log data"),
        (status = 409, description = "A log already exists for that date")
    )
)]
pub async fn create_activity_log(
    data: web::Data<AppState>,
    payload: web::Json<NewActivityLog>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    validation::validate_activity_log(&new)?;
    let log = data.repo.create_activity_log(new).await?;
    info!(log_id = log.id, date = %log.date, "activity log created");
    Ok(HttpResponse::Ok().json(log))
}

#[utoipa::path(
    put,
    path = "/api/activity-logs/{id}",
    request_body = NewActivityLog,
    params(("id" = Id, Path, description = "Activity log id")),
    responses(
        (status = 200, description = "Activity log replaced", body = ActivityLog),
        (status = 400, description = "Invalid id or body"),
        (status = 404, description = "Activity log not found"),
        (status = 409, description = "Another log already uses that date")
    )
)]
pub async fn update_activity_log(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewActivityLog>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let upd = payload.into_inner();
    validation::validate_activity_log(&upd)?;
    let log = data.repo.update_activity_log(id, upd).await?;
    Ok(HttpResponse::Ok().json(log))
}

#[utoipa::path(
    delete,
    path = "/api/activity-logs/{id}",
    params(("id" = Id, Path, description = "Activity log id")),
    responses(
        (status = 200, description = "Activity log deleted", body = SuccessResponse),
        (status = 400, description = "Non-numeric id"),
        (status = 404, description = "Activity log not found")
    )
)]
pub async fn delete_activity_log(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    data.repo.delete_activity_log(id).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

#[utoipa::path(
    get,
    path = "/api/activity-logs/date/{date}",
    params(("date" = String, Path, description = "Calendar date, YYYY-MM-DD")),
    responses(
        (status = 200, description = "Activity log for the date", body = ActivityLog),
        (status = 400, description = "Malformed date"),
        (status = 404, description = "No log for that date")
    )
)]
pub async fn get_activity_log_by_date(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let date = validation::parse_date(&path)?;
    let log = data.repo.get_activity_log_by_date(date).await?;
    Ok(HttpResponse::Ok().json(log))
}

#[utoipa::path(
    put,
    path = "/api/activity-logs/date/{date}",
    request_body = ActivityLogFields,
    params(("date" = String, Path, description = "Calendar date, YYYY-MM-DD")),
    responses(
        (status = 201, description = "Activity log created", body = ActivityLog),
        (status = 200, description = "Existing log for the date replaced", body = ActivityLog),
        (status = 400, description = "Malformed date or body")
    )
)]
pub async fn upsert_activity_log(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ActivityLogFields>,
) -> Result<HttpResponse, ApiError> {
    let date = validation::parse_date(&path)?;
    let new = payload.into_inner().on(date);
    validation::validate_activity_log(&new)?;
    let (log, created) = data.repo.upsert_activity_log(new).await?;
    if created {
        info!(log_id = log.id, %date, "activity log created by date");
        Ok(HttpResponse::Created().json(log))
    } else {
        Ok(HttpResponse::Ok().json(log))
    }
}

// ---------------- Injuries -----------------------

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InjuryQuery {
    pub user_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/injuries",
    params(InjuryQuery),
    responses((status = 200, description = "Injuries, most recent first", body = [Injury]))
)]
pub async fn list_injuries(data: web::Data<AppState>, query: web::Query<InjuryQuery>) -> Result<HttpResponse, ApiError> {
    let injuries = data.repo.list_injuries(query.user_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(injuries))
}

#[utoipa::path(
    post,
    path = "/api/injuries",
    request_body = NewInjury,
    responses(
        (status = 201, description = "Injury created", body = Injury),
        (status = 400, description = "Invalid injury data")
    )
)]
pub async fn create_injury(data: web::Data<AppState>, payload: web::Json<NewInjury>) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    validation::validate_injury(&new)?;
    let injury = data.repo.create_injury(new).await?;
    info!(injury_id = injury.id, "injury created");
    Ok(HttpResponse::Created().json(injury))
}

#[utoipa::path(
    get,
    path = "/api/injuries/{id}",
    params(("id" = Id, Path, description = "Injury id")),
    responses(
        (status = 200, description = "Injury", body = Injury),
        (status = 404, description = "Injury not found")
    )
)]
pub async fn get_injury(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let injury = data.repo.get_injury(id).await?;
    Ok(HttpResponse::Ok().json(injury))
}

#[utoipa::path(
    put,
    path = "/api/injuries/{id}",
    request_body = NewInjury,
    params(("id" = Id, Path, description = "Injury id")),
    responses(
        (status = 200, description = "Injury replaced", body = Injury),
        (status = 404, description = "Injury not found")
    )
)]
pub async fn update_injury(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewInjury>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let upd = payload.into_inner();
    validation::validate_injury(&upd)?;
    let injury = data.repo.update_injury(id, upd).await?;
    Ok(HttpResponse::Ok().json(injury))
}

#[utoipa::path(
    delete,
    path = "/api/injuries/{id}",
    params(("id" = Id, Path, description = "Injury id")),
    responses(
        (status = 200, description = "Injury deleted", body = SuccessResponse),
        (status = 404, description = "Injury not found")
    )
)]
pub async fn delete_injury(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    data.repo.delete_injury(id).await?;
    Ok(HttpResponse::Ok().json(SuccessResponse { success: true }))
}

// ---------------- Reference data -----------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExerciseQuery {
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/exercises",
    params(ExerciseQuery),
    responses((status = 200, description = "Exercise catalog", body = [crate::exercises::Exercise]))
)]
pub async fn list_exercises(query: web::Query<ExerciseQuery>) -> HttpResponse {
    HttpResponse::Ok().json(exercises::exercises(query.category.as_deref()))
}

#[utoipa::path(
    get,
    path = "/api/exercise-categories",
    responses((status = 200, description = "Exercise categories", body = [crate::exercises::ExerciseCategory]))
)]
pub async fn list_exercise_categories() -> HttpResponse {
    HttpResponse::Ok().json(exercises::categories())
}

#[utoipa::path(
    get,
    path = "/api/body-parts",
    responses((status = 200, description = "Body-part selector catalog", body = [crate::selector::BodyPart]))
)]
pub async fn list_body_parts() -> HttpResponse {
    HttpResponse::Ok().json(selector::catalog())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveBodyPartRequest {
    pub part: String,
    #[serde(default)]
    pub side: Option<Side>,
    pub view: View,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBodyPart {
    pub part: &'static str,
    pub side: Option<Side>,
    pub view: View,
    pub image_path: String,
}

#[utoipa::path(
    post,
    path = "/api/body-parts/resolve",
    request_body = ResolveBodyPartRequest,
    responses(
        (status = 200, description = "Reference image for the selection", body = ResolvedBodyPart),
        (status = 400, description = "Selection incomplete, unavailable or unknown")
    )
)]
pub async fn resolve_body_part(payload: web::Json<ResolveBodyPartRequest>) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    let sel = selector::resolve(&req.part, req.side, req.view)
        .map_err(|e| ValidationError::single("Invalid body part selection", "part", &e.to_string()))?;
    Ok(HttpResponse::Ok().json(ResolvedBodyPart {
        part: sel.part.id,
        side: sel.side,
        view: sel.view,
        image_path: sel.image_path(),
    }))
}

// ---------------- Subscriptions -----------------------

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[utoipa::path(
    post,
    path = "/api/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created, verification pending", body = MessageResponse),
        (status = 200, description = "Unverified subscription, verification resent", body = MessageResponse),
        (status = 400, description = "Invalid or already verified email")
    )
)]
pub async fn subscribe(data: web::Data<AppState>, payload: web::Json<SubscribeRequest>) -> Result<HttpResponse, ApiError> {
    let email = validation::normalize_email(&payload.email)?;
    let token = new_token();
    let (sub, status) = match data.repo.subscribe(&email, &token).await? {
        SubscribeOutcome::AlreadyVerified => return Err(ApiError::bad_request("Email already subscribed")),
        SubscribeOutcome::Created(sub) => (sub, "created"),
        SubscribeOutcome::Resent(sub) => (sub, "resent"),
    };
    // no mail transport: the link goes to the log
    debug!(
        email = %sub.email,
        link = %format!("{}/api/verify-subscription/{}", data.public_url.trim_end_matches('/'), token),
        "verification link issued"
    );
    info!(subscription_id = sub.id, status, "subscription verification sent");
    if status == "created" {
        Ok(HttpResponse::Created().json(MessageResponse {
            message: "Subscription created. Please check your email to verify.".into(),
        }))
    } else {
        Ok(HttpResponse::Ok().json(MessageResponse { message: "Verification email resent".into() }))
    }
}

#[utoipa::path(
    get,
    path = "/api/verify-subscription/{token}",
    params(("token" = String, Path, description = "Verification token")),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or already used token")
    )
)]
pub async fn verify_subscription(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    match data.repo.verify_subscription(&path).await {
        Ok(sub) => {
            info!(subscription_id = sub.id, "subscription verified");
            Ok(HttpResponse::Ok().json(MessageResponse { message: "Email verified successfully".into() }))
        }
        Err(RepoError::NotFound) => Err(ApiError::bad_request("Invalid or expired verification token")),
        Err(e) => Err(e.into()),
    }
}

// ---------------- Analytics -----------------------

const SESSION_HEADER: &str = "x-session-id";

fn session_id(req: &HttpRequest) -> String {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[utoipa::path(
    post,
    path = "/api/analytics",
    request_body = AnalyticsPayload,
    responses(
        (status = 202, description = "Event accepted", body = SuccessResponse),
        (status = 400, description = "Invalid analytics event")
    )
)]
pub async fn record_analytics(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<AnalyticsPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    validation::validate_analytics(&payload)?;
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let new = NewAnalyticsEvent {
        event: payload.event.trim().to_string(),
        metadata: if payload.metadata.is_null() { serde_json::json!({}) } else { payload.metadata },
        user_agent,
        session_id: session_id(&req),
    };
    // the client never waits on analytics; storage trouble is only logged
    if let Err(e) = data.repo.record_event(new).await {
        warn!(error = %e, "failed to record analytics event");
    }
    Ok(HttpResponse::Accepted().json(SuccessResponse { success: true }))
}
