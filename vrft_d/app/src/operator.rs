//! Operator HTTP API over the mutation pipeline.
//!
//! Requests that touch the pipeline are forwarded to the tick thread and
//! answered from there; actions start on their own worker thread.

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use common::mutations::{CalibrationHandle, CalibrationStatus};
use common::{
    ActionJob, CalibrationData, MutationError, OperatorConfig, PropertyValue, StageInfo,
    UnifiedTrackingMutator,
};
use log::{error, info};
use serde_json::json;
use std::sync::mpsc::Sender;
use std::thread;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub enum OperatorCommand {
    Describe(oneshot::Sender<Vec<StageInfo>>),
    SetProperty {
        stage: String,
        name: String,
        value: PropertyValue,
        reply: oneshot::Sender<Result<(), MutationError>>,
    },
    InvokeAction {
        stage: String,
        name: String,
        reply: oneshot::Sender<Result<(), MutationError>>,
    },
}

impl OperatorCommand {
    /// Run against the pipeline. Called on the tick thread between ticks.
    pub fn apply(self, mutator: &mut UnifiedTrackingMutator) {
        match self {
            Self::Describe(reply) => {
                let _ = reply.send(mutator.describe());
            }
            Self::SetProperty {
                stage,
                name,
                value,
                reply,
            } => {
                let _ = reply.send(mutator.set_property(&stage, &name, value));
            }
            Self::InvokeAction { stage, name, reply } => {
                let result = mutator
                    .action(&stage, &name)
                    .map(|job| spawn_action(format!("{}/{}", stage, name), job));
                let _ = reply.send(result);
            }
        }
    }
}

/// Run a detached action off the tick path.
pub fn spawn_action(label: String, job: ActionJob) {
    let spawned = thread::Builder::new()
        .name(format!("action:{}", label))
        .spawn(move || {
            info!("Action '{}' started", label);
            match job() {
                Ok(()) => info!("Action '{}' finished", label),
                Err(e) => error!("Action '{}' failed: {:#}", label, e),
            }
        });
    if let Err(e) = spawned {
        error!("Failed to spawn action thread: {}", e);
    }
}

#[derive(Clone)]
pub struct OperatorState {
    commands: Sender<OperatorCommand>,
    calibration: Option<CalibrationHandle>,
}

impl OperatorState {
    pub fn new(commands: Sender<OperatorCommand>, calibration: Option<CalibrationHandle>) -> Self {
        Self {
            commands,
            calibration,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> OperatorCommand,
    ) -> Result<T, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ApiError::unavailable())?;
        rx.await.map_err(|_| ApiError::unavailable())
    }

    fn calibration(&self) -> Result<&CalibrationHandle, ApiError> {
        self.calibration
            .as_ref()
            .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "No calibration stage".into()))
    }
}

pub struct ApiError(StatusCode, String);

impl ApiError {
    fn unavailable() -> Self {
        Self(
            StatusCode::SERVICE_UNAVAILABLE,
            "Tracking loop is not running".into(),
        )
    }
}

impl From<MutationError> for ApiError {
    fn from(e: MutationError) -> Self {
        let status = match e {
            MutationError::UnknownStage(_)
            | MutationError::UnknownProperty { .. }
            | MutationError::UnknownAction { .. } => StatusCode::NOT_FOUND,
            MutationError::TypeMismatch { .. } => StatusCode::BAD_REQUEST,
            MutationError::CalibrationInProgress | MutationError::CalibrationDisabled => {
                StatusCode::CONFLICT
            }
            MutationError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

async fn list_mutations(
    State(state): State<OperatorState>,
) -> Result<Json<Vec<StageInfo>>, ApiError> {
    state.request(OperatorCommand::Describe).await.map(Json)
}

async fn set_property(
    State(state): State<OperatorState>,
    Path((stage, name)): Path<(String, String)>,
    Json(value): Json<PropertyValue>,
) -> Result<StatusCode, ApiError> {
    state
        .request(|reply| OperatorCommand::SetProperty {
            stage,
            name,
            value,
            reply,
        })
        .await??;
    Ok(StatusCode::NO_CONTENT)
}

async fn invoke_action(
    State(state): State<OperatorState>,
    Path((stage, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .request(|reply| OperatorCommand::InvokeAction { stage, name, reply })
        .await??;
    Ok(StatusCode::ACCEPTED)
}

async fn calibration_status(
    State(state): State<OperatorState>,
) -> Result<Json<CalibrationStatus>, ApiError> {
    Ok(Json(state.calibration()?.status()?))
}

async fn calibration_data(
    State(state): State<OperatorState>,
) -> Result<Json<CalibrationData>, ApiError> {
    Ok(Json(state.calibration()?.snapshot()?))
}

pub fn router(state: OperatorState) -> Router {
    Router::new()
        .route("/mutations", get(list_mutations))
        .route("/mutations/:stage/properties/:name", put(set_property))
        .route("/mutations/:stage/actions/:name", post(invoke_action))
        .route("/calibration", get(calibration_status))
        .route("/calibration/data", get(calibration_data))
        .with_state(state)
}

/// Serve the API on its own thread with a private tokio runtime.
pub fn spawn_server(config: &OperatorConfig, state: OperatorState) -> Result<()> {
    let port = config.port;
    thread::Builder::new()
        .name("operator-api".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime for the operator API: {}", e);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(serve(port, state)) {
                error!("Operator API stopped: {:#}", e);
            }
        })
        .context("Failed to spawn operator API thread")?;
    Ok(())
}

async fn serve(port: u16, state: OperatorState) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind operator API on port {}", port))?;
    info!("Operator API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
