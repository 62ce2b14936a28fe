//! Mock Telegram API Server for testing
//!
//! Simulates the Telegram Bot API with wiremock so notifications can be
//! asserted on without network access.

use serde_json::{json, Value};
use teloxide::Bot;
use wiremock::{
    matchers::{method, path_regex},
    Mock, MockServer, Request, ResponseTemplate,
};

pub const TEST_BOT_TOKEN: &str = "12345:test_token";

/// Mock Telegram API server for testing
pub struct TelegramMockServer {
    pub server: MockServer,
}

impl TelegramMockServer {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Bot whose requests go to this server
    pub fn bot(&self) -> Bot {
        let url = url::Url::parse(&self.server.uri()).expect("mock server uri");
        Bot::new(TEST_BOT_TOKEN).set_api_url(url)
    }

    /// Answer every sendMessage call with a plausible message
    pub async fn mock_send_message(&self) {
        // teloxide spells the method `SendMessage`
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_message()))
            .mount(&self.server)
            .await;
    }

    /// Bodies of all sendMessage calls received so far
    pub async fn sent_messages(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path().to_ascii_lowercase().ends_with("/sendmessage"))
            .filter_map(|request: &Request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}

fn sent_message() -> Value {
    json!({
        "ok": true,
        "result": {
            "message_id": 123,
            "from": {
                "id": 12345,
                "is_bot": true,
                "first_name": "Aisha",
                "username": "aisha_bot"
            },
            "chat": {
                "id": 555000111,
                "first_name": "Test",
                "type": "private"
            },
            "date": 1717236000,
            "text": "ok"
        }
    })
}
