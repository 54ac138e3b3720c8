//! The Lifecycle Controller: public bot lifecycle endpoints plus the
//! internal callbacks the bot process uses to report its own progress.

use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use mb_domain::{Error, Platform, Result};
use mb_fsm::{CompletionReason, FailureStage, Status, TransitionSource};
use mb_launcher::StartBotArgs;
use mb_store::{CreateOutcome, Meeting, TransitionArgs};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::runtime::{dispatch, reaper};
use crate::state::{AppState, AuthedUser};

const FAST_PATH_WINDOW_SECS: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct RequestBotBody {
    pub platform: Platform,
    pub native_meeting_id: String,
    pub passcode: Option<String>,
    pub bot_name: Option<String>,
    pub language: Option<String>,
    pub task: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeetingView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: Platform,
    pub native_meeting_id: String,
    pub status: Status,
    pub bot_container_id: Option<String>,
}

impl From<&Meeting> for MeetingView {
    fn from(m: &Meeting) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            platform: m.platform,
            native_meeting_id: m.platform_specific_id.clone(),
            status: m.status,
            bot_container_id: m.bot_container_id.clone(),
        }
    }
}

/// `POST /bots`.
///
/// Concurrency is checked before the row is created (rather than after, as
/// a literal reading of creating first then counting would require undoing
/// the insert on rejection) — this mirrors the reference bot-manager's
/// fast-fail ordering, which counts active meetings before ever touching
/// the table.
pub async fn request_bot(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(body): Json<RequestBotBody>,
) -> axum::response::Response {
    match request_bot_inner(&state, &user, body).await {
        Ok(meeting) => (axum::http::StatusCode::CREATED, Json(MeetingView::from(&meeting))).into_response(),
        Err(e) => api_error(e),
    }
}

async fn request_bot_inner(state: &AppState, user: &AuthedUser, body: RequestBotBody) -> Result<Meeting> {
    let url = crate::api::platform_url::build_meeting_url(
        body.platform,
        &body.native_meeting_id,
        body.passcode.as_deref(),
    )
    .ok_or_else(|| {
        Error::Validation(format!(
            "cannot construct meeting url for platform {} / id {}",
            body.platform, body.native_meeting_id
        ))
    })?;

    if user.max_concurrent_bots > 0 {
        let active = state.meetings.count_active_for_user(user.user_id).await?;
        if active >= i64::from(user.max_concurrent_bots) {
            return Err(mb_launcher::limit_exceeded(
                user.user_id,
                active as usize,
                user.max_concurrent_bots,
            ));
        }
    }

    let outcome = state
        .meetings
        .create_meeting(user.user_id, body.platform, &body.native_meeting_id, body.passcode.as_deref())
        .await?;
    let meeting = match outcome {
        CreateOutcome::Created(m) => m,
        CreateOutcome::Conflict(m) => {
            return Err(Error::Conflict(format!(
                "an active or requested meeting already exists: {}",
                m.id
            )));
        }
    };

    if field_invalid(&url) || field_invalid(&body.native_meeting_id) || field_invalid(&body.platform.to_string()) {
        fail_meeting(state, meeting.id, FailureStage::Joining, "invalid launch inputs").await;
        return Err(Error::Validation("invalid launch inputs".into()));
    }

    let start_args = StartBotArgs {
        user_id: user.user_id,
        meeting_id: meeting.id,
        meeting_url: url,
        platform: body.platform,
        native_id: body.native_meeting_id.clone(),
        bot_name: body.bot_name,
        user_token: user.token.clone(),
        language: body.language,
        task: body.task,
    };

    let started = match state.launcher.start_bot(start_args, user.max_concurrent_bots).await {
        Ok(s) => s,
        Err(e) => {
            fail_meeting(state, meeting.id, FailureStage::Joining, &e.to_string()).await;
            return Err(Error::Runtime(format!("starting bot: {e}")));
        }
    };

    state.meetings.set_container_id(meeting.id, &started.handle).await?;
    state
        .bus
        .cache_set_current_session(body.platform, &meeting.platform_specific_id, &started.session_uid)
        .await;

    let sessions = state.sessions.clone();
    let meeting_id = meeting.id;
    let session_uid = started.session_uid.clone();
    tokio::spawn(async move {
        if let Err(e) = sessions.record_session_start(meeting_id, &session_uid).await {
            tracing::warn!(%meeting_id, error = %e, "recording session start failed");
        }
    });

    crate::runtime::publish::status_changed(&state.bus, body.platform, &meeting.platform_specific_id, Status::Requested).await;

    state
        .meetings
        .get(meeting.id)
        .await?
        .ok_or_else(|| Error::Other(format!("meeting {} disappeared after creation", meeting.id)))
}

fn field_invalid(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.is_empty() || trimmed.contains('\n') || trimmed.contains('\r')
}

async fn fail_meeting(state: &AppState, meeting_id: Uuid, stage: FailureStage, reason: &str) {
    let args = TransitionArgs {
        reason: Some(reason.to_owned()),
        failure_stage: Some(stage),
        ..Default::default()
    };
    match state.meetings.apply_transition(meeting_id, Status::Failed, TransitionSource::System, args).await {
        Ok(true) => {
            if let Ok(Some(m)) = state.meetings.get(meeting_id).await {
                crate::runtime::publish::status_changed(&state.bus, m.platform, &m.platform_specific_id, Status::Failed).await;
            }
            dispatch::run(meeting_id);
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(%meeting_id, error = %e, "failed to mark meeting FAILED"),
    }
}

/// `DELETE /bots/{platform}/{native_meeting_id}`.
pub async fn stop_bot(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path((platform, native_id)): Path<(Platform, String)>,
) -> axum::response::Response {
    match stop_bot_inner(&state, &user, platform, &native_id).await {
        Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(e) => api_error(e),
    }
}

async fn stop_bot_inner(state: &AppState, user: &AuthedUser, platform: Platform, native_id: &str) -> Result<()> {
    let Some(meeting) = state.meetings.find_latest(user.user_id, platform, native_id).await? else {
        return Ok(());
    };

    if meeting.status.is_terminal() {
        return Ok(());
    }

    if meeting.bot_container_id.is_none() {
        complete_and_finalize(state, &meeting, CompletionReason::Stopped).await;
        return Ok(());
    }

    let is_pre_active = meeting.status.is_active_set() && meeting.status != Status::Active;
    let is_fast_path = is_pre_active
        && chrono::Utc::now().signed_duration_since(meeting.created_at).num_seconds() <= FAST_PATH_WINDOW_SECS;

    if is_fast_path {
        state.meetings.set_stop_requested(meeting.id).await?;
        if let Some(handle) = meeting.bot_container_id.clone() {
            reaper::schedule(state.launcher.clone(), handle, std::time::Duration::from_secs(0));
        }
        complete_and_finalize(state, &meeting, CompletionReason::Stopped).await;
        return Ok(());
    }

    if let Some(uid) = state.sessions.earliest_session_uid(meeting.id).await? {
        state.bus.publish_leave(&uid).await;
    }
    if let Some(handle) = meeting.bot_container_id.clone() {
        reaper::schedule(
            state.launcher.clone(),
            handle,
            std::time::Duration::from_secs(state.config.reaper.general_delay_secs),
        );
    }
    Ok(())
}

async fn complete_and_finalize(state: &AppState, meeting: &Meeting, reason: CompletionReason) {
    let args = TransitionArgs {
        completion_reason: Some(reason),
        ..Default::default()
    };
    match state.meetings.apply_transition(meeting.id, Status::Completed, TransitionSource::User, args).await {
        Ok(true) => {
            crate::runtime::publish::status_changed(&state.bus, meeting.platform, &meeting.platform_specific_id, Status::Completed).await;
            dispatch::run(meeting.id);
        }
        Ok(false) => {}
        Err(e) => tracing::warn!(meeting_id = %meeting.id, error = %e, "completing meeting failed"),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBotConfigBody {
    pub language: Option<String>,
    pub task: Option<String>,
}

/// `PUT /bots/{platform}/{native_meeting_id}/config`.
pub async fn update_bot_config(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path((platform, native_id)): Path<(Platform, String)>,
    Json(body): Json<UpdateBotConfigBody>,
) -> axum::response::Response {
    match update_bot_config_inner(&state, &user, platform, &native_id, body).await {
        Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
        Err(e) => api_error(e),
    }
}

async fn update_bot_config_inner(
    state: &AppState,
    user: &AuthedUser,
    platform: Platform,
    native_id: &str,
    body: UpdateBotConfigBody,
) -> Result<()> {
    let meeting = state
        .meetings
        .find_latest(user.user_id, platform, native_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("no meeting for {platform}/{native_id}")))?;

    if meeting.status != Status::Active {
        return Err(Error::Conflict(format!(
            "meeting {} is {:?}, not active",
            meeting.id, meeting.status
        )));
    }

    let cached = state.bus.cache_get_current_session(platform, native_id).await;
    let uid = match cached {
        Some(uid) => uid,
        None => state
            .sessions
            .latest_session_uid(meeting.id)
            .await?
            .ok_or_else(|| Error::Availability("no session to reconfigure".into()))?,
    };

    state.bus.publish_reconfigure(&uid, body.language, body.task).await;
    Ok(())
}

/// `GET /bots/status`.
pub async fn list_running_bots(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> axum::response::Response {
    match state.launcher.list_running_bots(user.user_id).await {
        Ok(bots) => Json(json!({ "running_bots": bots })).into_response(),
        Err(e) => api_error(Error::Runtime(e.to_string())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Internal bot callbacks, keyed by session_uid
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SimpleCallbackBody {
    pub connection_id: String,
    pub container_id: Option<String>,
}

async fn resolve_meeting(state: &AppState, session_uid: &str) -> Result<Option<Meeting>> {
    let Some(meeting_id) = state.sessions.find_meeting_id(session_uid).await? else {
        return Ok(None);
    };
    state.meetings.get(meeting_id).await
}

fn ignored() -> axum::response::Response {
    Json(json!({ "status": "ignored" })).into_response()
}

pub async fn callback_joining(
    State(state): State<AppState>,
    Json(body): Json<SimpleCallbackBody>,
) -> axum::response::Response {
    advance_callback(&state, &body.connection_id, body.container_id.as_deref(), Status::Joining).await
}

pub async fn callback_awaiting_admission(
    State(state): State<AppState>,
    Json(body): Json<SimpleCallbackBody>,
) -> axum::response::Response {
    advance_callback(&state, &body.connection_id, body.container_id.as_deref(), Status::AwaitingAdmission).await
}

async fn advance_callback(
    state: &AppState,
    session_uid: &str,
    container_id: Option<&str>,
    target: Status,
) -> axum::response::Response {
    let Some(meeting) = (match resolve_meeting(state, session_uid).await {
        Ok(m) => m,
        Err(e) => return api_error(e),
    }) else {
        return ignored();
    };

    if meeting.stop_requested() {
        return ignored();
    }

    let args = TransitionArgs {
        container_id: container_id.map(str::to_owned),
        ..Default::default()
    };
    match state.meetings.apply_transition(meeting.id, target, TransitionSource::Bot, args).await {
        Ok(true) => {
            crate::runtime::publish::status_changed(&state.bus, meeting.platform, &meeting.platform_specific_id, target).await;
            axum::http::StatusCode::OK.into_response()
        }
        Ok(false) => ignored(),
        Err(e) => api_error(e),
    }
}

pub async fn callback_started(
    State(state): State<AppState>,
    Json(body): Json<SimpleCallbackBody>,
) -> axum::response::Response {
    let Some(meeting) = (match resolve_meeting(&state, &body.connection_id).await {
        Ok(m) => m,
        Err(e) => return api_error(e),
    }) else {
        return ignored();
    };

    if meeting.stop_requested() {
        return ignored();
    }

    if meeting.status == Status::Active {
        if let Some(container_id) = body.container_id {
            if let Err(e) = state.meetings.set_container_id(meeting.id, &container_id).await {
                return api_error(e);
            }
        }
        return axum::http::StatusCode::OK.into_response();
    }

    let args = TransitionArgs {
        container_id: body.container_id.clone(),
        ..Default::default()
    };
    match state.meetings.apply_transition(meeting.id, Status::Active, TransitionSource::Bot, args).await {
        Ok(true) => {
            crate::runtime::publish::status_changed(&state.bus, meeting.platform, &meeting.platform_specific_id, Status::Active).await;
            axum::http::StatusCode::OK.into_response()
        }
        Ok(false) => ignored(),
        Err(e) => api_error(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExitedCallbackBody {
    pub connection_id: String,
    pub exit_code: i32,
    pub reason: Option<String>,
    pub completion_reason: Option<CompletionReason>,
    pub failure_stage: Option<FailureStage>,
    pub error_details: Option<serde_json::Value>,
    pub platform_specific_error: Option<String>,
}

pub async fn callback_exited(
    State(state): State<AppState>,
    Json(body): Json<ExitedCallbackBody>,
) -> axum::response::Response {
    let Some(meeting) = (match resolve_meeting(&state, &body.connection_id).await {
        Ok(m) => m,
        Err(e) => return api_error(e),
    }) else {
        return ignored();
    };

    if meeting.status.is_terminal() {
        return ignored();
    }

    let (target, completion_reason, failure_stage) = if body.exit_code == 0 {
        (Status::Completed, Some(body.completion_reason.unwrap_or(CompletionReason::Stopped)), None)
    } else {
        (Status::Failed, None, Some(body.failure_stage.unwrap_or(FailureStage::Active)))
    };

    let mut error_details = body.error_details;
    if let Some(platform_error) = body.platform_specific_error {
        let mut obj = error_details.and_then(|v| v.as_object().cloned()).unwrap_or_default();
        obj.insert("platform_specific_error".into(), json!(platform_error));
        error_details = Some(serde_json::Value::Object(obj));
    }

    let args = TransitionArgs {
        reason: body.reason,
        completion_reason,
        failure_stage,
        error_details,
        last_error: if body.exit_code != 0 {
            Some(json!({ "exit_code": body.exit_code }))
        } else {
            None
        },
        ..Default::default()
    };

    let applied = match state.meetings.apply_transition(meeting.id, target, TransitionSource::Bot, args).await {
        Ok(v) => v,
        Err(e) => return api_error(e),
    };

    if applied {
        crate::runtime::publish::status_changed(&state.bus, meeting.platform, &meeting.platform_specific_id, target).await;
    }

    dispatch::run(meeting.id);

    if body.exit_code != 0 {
        if let Some(handle) = meeting.bot_container_id.clone() {
            reaper::schedule(
                state.launcher.clone(),
                handle,
                std::time::Duration::from_secs(state.config.reaper.error_exit_delay_secs),
            );
        }
    }

    if applied {
        axum::http::StatusCode::OK.into_response()
    } else {
        ignored()
    }
}

fn api_error(err: Error) -> axum::response::Response {
    let status = match &err {
        Error::Validation(_) => axum::http::StatusCode::UNPROCESSABLE_ENTITY,
        Error::Conflict(_) => axum::http::StatusCode::CONFLICT,
        Error::Limit(_) => axum::http::StatusCode::FORBIDDEN,
        Error::Availability(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
        Error::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
        Error::Auth(_) => axum::http::StatusCode::UNAUTHORIZED,
        Error::Runtime(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_invalid_rejects_empty_and_whitespace() {
        assert!(field_invalid(""));
        assert!(field_invalid("   "));
    }

    #[test]
    fn field_invalid_rejects_embedded_newlines() {
        assert!(field_invalid("abc\ndef"));
        assert!(field_invalid("abc\rdef"));
    }

    #[test]
    fn field_invalid_accepts_ordinary_text() {
        assert!(!field_invalid("abc-defg-hij"));
    }

    #[test]
    fn meeting_view_maps_native_id_from_platform_specific_id() {
        let meeting = Meeting {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            platform: Platform::Zoom,
            platform_specific_id: "123456789".into(),
            status: Status::Requested,
            bot_container_id: None,
            start_time: None,
            end_time: None,
            created_at: chrono::Utc::now(),
            data: json!({}),
        };
        let view = MeetingView::from(&meeting);
        assert_eq!(view.native_meeting_id, "123456789");
        assert_eq!(view.platform, Platform::Zoom);
    }
}
