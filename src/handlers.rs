// src/handlers.rs
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::analytics::{self, AnalyticsSnapshot};
use crate::auth::{self, AuthUser};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::{
    AuthResponse, CreateNotePayload, ListNotesQuery, LoginPayload, MessageResponse,
    NoteId, NoteListResponse, NoteMessageResponse, NoteResponse, SignupPayload,
    UpdateNotePayload, UserResponse,
};
use crate::validation::{LoginForm, NoteDraft, NotePatch, SignupForm};
use crate::AppState;

// 路径里不是整数的 id 与不存在的笔记同等对待
fn note_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<NoteId> {
    path.map(|Path(id)| NoteId::new(id))
        .map_err(|_| AppError::note_not_found())
}

pub async fn health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "working fine!",
    })
}

// --- 认证 ---

pub async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let form = SignupForm::from_payload(payload)?;
    let (user, token) = auth::signup(&state.pool, &state.credentials, form).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Signup Successful",
            token,
            user: UserResponse::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let form = LoginForm::from_payload(payload)?;
    let (user, token) = auth::login(&state.pool, &state.credentials, form).await?;

    Ok(Json(AuthResponse {
        message: "Login Successful",
        token,
        user: UserResponse::from(&user),
    }))
}

// --- 笔记 ---

pub async fn create_note(
    State(state): State<AppState>,
    user: AuthUser,
    payload: std::result::Result<Json<CreateNotePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<NoteMessageResponse>)> {
    let Json(payload) = payload?;
    let draft = NoteDraft::from_payload(payload)?;
    let note = db::create_note_db(&state.pool, user.id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(NoteMessageResponse {
            message: "Note created successfully",
            note,
        }),
    ))
}

pub async fn list_notes(
    State(state): State<AppState>,
    user: AuthUser,
    query: std::result::Result<Query<ListNotesQuery>, QueryRejection>,
) -> Result<Json<NoteListResponse>> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let notes = db::list_notes_db(&state.pool, user.id, query.search.as_deref()).await?;

    Ok(Json(NoteListResponse {
        total: notes.len(),
        notes,
    }))
}

pub async fn get_note(
    State(state): State<AppState>,
    user: AuthUser,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<NoteResponse>> {
    let id = note_id(path)?;
    let note = db::get_note_db(&state.pool, user.id, id).await?;
    Ok(Json(NoteResponse { note }))
}

pub async fn update_note(
    State(state): State<AppState>,
    user: AuthUser,
    path: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateNotePayload>, JsonRejection>,
) -> Result<Json<NoteMessageResponse>> {
    let id = note_id(path)?;
    let Json(payload) = payload?;
    let patch = NotePatch::from_payload(payload)?;
    let note = db::update_note_db(&state.pool, user.id, id, patch).await?;

    Ok(Json(NoteMessageResponse {
        message: "Note updated successfully",
        note,
    }))
}

pub async fn delete_note(
    State(state): State<AppState>,
    user: AuthUser,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let id = note_id(path)?;
    db::delete_note_db(&state.pool, user.id, id).await?;

    Ok(Json(MessageResponse {
        message: "Note deleted successfully",
    }))
}

// --- 统计 ---

pub async fn analytics_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AnalyticsSnapshot>> {
    let snapshot = analytics::summarize(&state.pool, user.id, Utc::now()).await?;
    Ok(Json(snapshot))
}
