use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use catlab_types::{CategoryLabels, DialogueAct, DialogueActConfusionNetwork, DialogueActNBList};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser::{CategoryLabelParser, Input, SluError, SluParser};
use crate::preprocess::SluPreprocessing;

#[derive(Clone)]
pub struct AppState {
    pub preprocessing: Arc<SluPreprocessing>,
    /// Normalize inputs before abstraction.
    pub normalize: bool,
}

impl AppState {
    fn prepare(&self, input: Input) -> Input {
        if self.normalize {
            self.preprocessing.normalize(&input)
        } else {
            input
        }
    }
}

#[derive(Deserialize)]
pub struct InputRequest {
    pub input: Value,
}

#[derive(Deserialize)]
pub struct AbstractRequest {
    pub input: Value,
    pub da: Option<DialogueAct>,
}

#[derive(Deserialize)]
pub struct RestoreRequest {
    pub category_labels: CategoryLabels,
    pub input: Option<Value>,
    pub da: Option<DialogueAct>,
    pub da_nblist: Option<DialogueActNBList>,
    pub da_confnet: Option<DialogueActConfusionNetwork>,
}

impl RestoreRequest {
    fn is_empty(&self) -> bool {
        self.input.is_none()
            && self.da.is_none()
            && self.da_nblist.is_none()
            && self.da_confnet.is_none()
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    records: usize,
    forms: usize,
    homonyms: usize,
    rules: usize,
}

#[derive(Serialize)]
pub struct InputResponse {
    input: Input,
}

#[derive(Serialize)]
pub struct AbstractResponse {
    input: Input,
    #[serde(skip_serializing_if = "Option::is_none")]
    da: Option<DialogueAct>,
    category_labels: CategoryLabels,
}

#[derive(Serialize)]
pub struct RestoreResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<Input>,
    #[serde(skip_serializing_if = "Option::is_none")]
    da: Option<DialogueAct>,
    #[serde(skip_serializing_if = "Option::is_none")]
    da_nblist: Option<DialogueActNBList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    da_confnet: Option<DialogueActConfusionNetwork>,
}

#[derive(Serialize)]
pub struct ParseResponse {
    da_confnet: DialogueActConfusionNetwork,
    abstracted: Input,
    category_labels: CategoryLabels,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/stats", get(stats))
        .route("/v1/normalize", post(normalize))
        .route("/v1/abstract", post(abstract_values))
        .route("/v1/restore", post(restore))
        .route("/v1/parse", post(parse))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let cldb = state.preprocessing.cldb();
    Json(StatsResponse {
        records: cldb.record_count(),
        forms: cldb.form_count(),
        homonyms: cldb.homonyms().count(),
        rules: state.preprocessing.normalizer().rules().len(),
    })
}

async fn normalize(
    State(state): State<AppState>,
    Json(req): Json<InputRequest>,
) -> Result<Json<InputResponse>, ApiError> {
    let input = Input::from_value(req.input)?;
    Ok(Json(InputResponse {
        input: state.preprocessing.normalize(&input),
    }))
}

async fn abstract_values(
    State(state): State<AppState>,
    Json(req): Json<AbstractRequest>,
) -> Result<Json<AbstractResponse>, ApiError> {
    let input = state.prepare(Input::from_value(req.input)?);
    let pre = &state.preprocessing;
    let response = match req.da {
        Some(da) => {
            let (input, da, category_labels) = pre.values_to_category_labels_in_da(&input, &da);
            AbstractResponse {
                input,
                da: Some(da),
                category_labels,
            }
        }
        None => {
            let (input, category_labels) = pre.values_to_category_labels(&input);
            AbstractResponse {
                input,
                da: None,
                category_labels,
            }
        }
    };
    debug!(
        "abstracted {} input with {} labels",
        response.input.kind(),
        response.category_labels.len()
    );
    Ok(Json(response))
}

async fn restore(
    State(state): State<AppState>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<RestoreResponse>, ApiError> {
    if req.is_empty() {
        return Err(ApiError::bad_request("nothing to restore"));
    }
    let pre = &state.preprocessing;
    let labels = &req.category_labels;
    let input = req
        .input
        .map(Input::from_value)
        .transpose()?
        .map(|input| pre.category_labels_to_values(&input, labels));
    Ok(Json(RestoreResponse {
        input,
        da: req
            .da
            .map(|da| pre.category_labels_to_values_in_da(&da, labels)),
        da_nblist: req
            .da_nblist
            .map(|nblist| pre.category_labels_to_values_in_da_nblist(&nblist, labels)),
        da_confnet: req
            .da_confnet
            .map(|confnet| pre.category_labels_to_values_in_da_confnet(&confnet, labels)),
    }))
}

async fn parse(
    State(state): State<AppState>,
    Json(req): Json<InputRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    let input = state.prepare(Input::from_value(req.input)?);
    let pre = &state.preprocessing;
    let (abstracted, category_labels) = pre.values_to_category_labels(&input);
    let da_confnet = CategoryLabelParser.parse(&abstracted)?;
    let da_confnet = pre.category_labels_to_values_in_da_confnet(&da_confnet, &category_labels);
    Ok(Json(ParseResponse {
        da_confnet,
        abstracted,
        category_labels,
    }))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<SluError> for ApiError {
    fn from(err: SluError) -> Self {
        match err {
            SluError::NotImplemented(what) => {
                warn!("parser cannot handle request: {what}");
                ApiError::Internal
            }
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                let body = Json(ErrorResponse { error: msg });
                (StatusCode::BAD_REQUEST, body).into_response()
            }
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
