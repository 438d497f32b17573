use reqwest::Client;

use super::{ApiError, ChatBackend, ChatRequest, ChatResponse};

/// HTTP client for the trip planner server.
#[derive(Clone)]
pub struct PlannerClient {
    client: Client,
    base_url: String,
}

impl PlannerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ChatBackend for PlannerClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(%url, has_session = request.session_id.is_some(), "sending chat request");

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn reset(&self) -> Result<(), ApiError> {
        let url = format!("{}/api/reset", self.base_url);
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_happy_path_echoes_session_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(serde_json::json!({
                "message": "Plan a trip to Tokyo",
                "session_id": "s-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "## Tokyo\nDay 1: **Shibuya**",
                "session_id": "s-42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlannerClient::new(&format!("{}/", server.uri()));
        let reply = client
            .chat(&ChatRequest {
                message: "Plan a trip to Tokyo".into(),
                session_id: Some("s-42".into()),
            })
            .await
            .expect("chat");

        assert_eq!(
            reply,
            ChatResponse::Reply {
                response: "## Tokyo\nDay 1: **Shibuya**".into(),
                session_id: Some("s-42".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_chat_application_error_is_not_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "error": "No flights found" })),
            )
            .mount(&server)
            .await;

        let client = PlannerClient::new(&server.uri());
        let reply = client
            .chat(&ChatRequest {
                message: "x".into(),
                session_id: None,
            })
            .await
            .expect("chat");
        assert_eq!(
            reply,
            ChatResponse::Error {
                error: "No flights found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_chat_server_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PlannerClient::new(&server.uri());
        let result = client
            .chat(&ChatRequest {
                message: "x".into(),
                session_id: None,
            })
            .await;
        assert!(matches!(result, Err(ApiError::Status(status)) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_chat_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = PlannerClient::new(&server.uri());
        let result = client
            .chat(&ChatRequest {
                message: "x".into(),
                session_id: None,
            })
            .await;
        assert!(matches!(result, Err(ApiError::Json(_))));
    }

    #[tokio::test]
    async fn test_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/reset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "Session reset successfully",
                "status": "fresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PlannerClient::new(&server.uri());
        assert!(client.reset().await.is_ok());
    }
}
