//! HTTP request handlers for the on-demand trigger.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pipeline::{IngestPipeline, RunReport, RunRequest};

const MISSING_PARAMS: &str =
    "Please pass arg1, arg2, and subreddits in the query string or in the request body";

/// Application state shared across handlers.
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Forums as either a JSON list or a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ForumList {
    List(Vec<String>),
    Csv(String),
}

impl ForumList {
    /// Trimmed, non-empty forum names.
    pub fn into_forums(self) -> Vec<String> {
        let raw = match self {
            ForumList::List(list) => list,
            ForumList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// Query-string parameters of a fetch request.
#[derive(Debug, Default, Deserialize)]
pub struct FetchQuery {
    arg1: Option<String>,
    arg2: Option<String>,
    subreddits: Option<String>,
}

/// JSON body of a fetch request.
#[derive(Debug, Default, Deserialize)]
pub struct FetchBody {
    arg1: Option<String>,
    arg2: Option<String>,
    subreddits: Option<ForumList>,
}

/// Fetch response: a completion summary plus the run report.
#[derive(Debug, Serialize)]
pub struct FetchResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RunReport>,
}

/// `GET /fetch?arg1=..&arg2=..&subreddits=a,b`
pub async fn fetch_from_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchQuery>,
) -> Response {
    run_fetch(
        &state,
        query.arg1,
        query.arg2,
        query.subreddits.map(ForumList::Csv),
    )
    .await
}

/// `POST /fetch` with a JSON body; query parameters take precedence.
pub async fn fetch_from_body(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FetchQuery>,
    body: Bytes,
) -> Response {
    let body: FetchBody = if body.iter().all(u8::is_ascii_whitespace) {
        FetchBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Rejected fetch request with invalid JSON body");
                return reply(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"), None);
            }
        }
    };

    run_fetch(
        &state,
        query.arg1.or(body.arg1),
        query.arg2.or(body.arg2),
        query.subreddits.map(ForumList::Csv).or(body.subreddits),
    )
    .await
}

async fn run_fetch(
    state: &AppState,
    arg1: Option<String>,
    arg2: Option<String>,
    subreddits: Option<ForumList>,
) -> Response {
    let arg1 = arg1.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    let arg2 = arg2.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
    let forums = subreddits.map(ForumList::into_forums).unwrap_or_default();

    let (arg1, arg2) = match (arg1, arg2) {
        (Some(arg1), Some(arg2)) if !forums.is_empty() => (arg1, arg2),
        _ => return reply(StatusCode::BAD_REQUEST, MISSING_PARAMS.to_string(), None),
    };

    info!(%arg1, %arg2, forums = forums.len(), "Received fetch request");

    let request = RunRequest::new(forums, vec![arg1.clone(), arg2.clone()]);
    match state.pipeline.run(&request).await {
        Ok(report) if report.failed_searches.is_empty() => reply(
            StatusCode::OK,
            format!("Data fetching for {arg1} and {arg2} completed."),
            Some(report),
        ),
        Ok(report) => {
            let failed: Vec<String> = report
                .failed_searches
                .iter()
                .map(|f| format!("r/{} ({})", f.forum, f.term))
                .collect();
            // Nothing reached the source: report an upstream outage.
            let status = if report.searches > 0 && failed.len() == report.searches {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::OK
            };
            reply(
                status,
                format!(
                    "Data fetching for {arg1} and {arg2} completed with failed searches: {}",
                    failed.join(", ")
                ),
                Some(report),
            )
        }
        Err(e) => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Data fetching for {arg1} and {arg2} failed: {e}"),
            e.report().cloned(),
        ),
    }
}

fn reply(status: StatusCode, message: String, report: Option<RunReport>) -> Response {
    (status, Json(FetchResponse { message, report })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forum_list_from_csv() {
        let forums = ForumList::Csv(" gaming, xbox ,,ps5".to_string()).into_forums();
        assert_eq!(forums, vec!["gaming", "xbox", "ps5"]);
    }

    #[test]
    fn test_forum_list_from_json() {
        let list: ForumList = serde_json::from_str(r#"["gaming", " "]"#).unwrap();
        assert_eq!(list.into_forums(), vec!["gaming"]);

        let csv: ForumList = serde_json::from_str(r#""gaming,xbox""#).unwrap();
        assert_eq!(csv.into_forums(), vec!["gaming", "xbox"]);
    }
}
