pub mod planner;

use std::future::Future;

use serde::{Deserialize, Serialize};

pub use planner::PlannerClient;

/// Error types for calls to the planner endpoint
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned error status: {0}")]
    Status(reqwest::StatusCode),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Either a reply or an application-level error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Reply {
        response: String,
        #[serde(default)]
        session_id: Option<String>,
    },
    Error {
        error: String,
    },
}

/// The remote assistant endpoint.
pub trait ChatBackend: Send + Sync {
    fn chat(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, ApiError>> + Send;

    /// Best effort: callers reset local state whatever this returns.
    fn reset(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_missing_session_id() {
        let request = ChatRequest {
            message: "Plan a trip to Bali".into(),
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "message": "Plan a trip to Bali" })
        );

        let request = ChatRequest {
            session_id: Some("abc".into()),
            ..request
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "message": "Plan a trip to Bali", "session_id": "abc" })
        );
    }

    #[test]
    fn test_response_shapes() {
        let reply: ChatResponse =
            serde_json::from_str(r#"{"response": "Here you go", "session_id": "s1"}"#).unwrap();
        assert_eq!(
            reply,
            ChatResponse::Reply {
                response: "Here you go".into(),
                session_id: Some("s1".into()),
            }
        );

        let error: ChatResponse = serde_json::from_str(r#"{"error": "Message is required"}"#).unwrap();
        assert_eq!(
            error,
            ChatResponse::Error {
                error: "Message is required".into()
            }
        );

        assert!(serde_json::from_str::<ChatResponse>(r#"{"status": "ok"}"#).is_err());
    }
}
