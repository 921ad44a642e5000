use crate::notify::{Notifier, NotifyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Upper bound for one Bot API call, so a hung send still ends in a logged failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    bot_token: String,
    bot_username: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

/// Bot API envelope. Failed calls come back as `ok: false` with an error code
/// and description, usually alongside a 4xx status.
#[derive(Debug, Deserialize)]
struct TelegramApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}

impl TelegramClient {
    pub fn new(bot_token: String, bot_username: Option<String>, api_base: String) -> Self {
        Self {
            bot_token,
            bot_username,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: http_client(REQUEST_TIMEOUT),
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<Option<T>, NotifyError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: TelegramApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| NotifyError::Decode(format!("{} ({}): {}", method, status, e)))?;

        if !parsed.ok {
            return Err(NotifyError::Api {
                code: parsed.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: parsed
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        Ok(parsed.result)
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        self.call::<_, serde_json::Value>("sendMessage", &SendMessageRequest { chat_id, text })
            .await?;
        Ok(())
    }

    /// Returns the username the token belongs to.
    pub async fn get_me(&self) -> Result<Option<String>, NotifyError> {
        let user: Option<User> = self.call("getMe", &serde_json::json!({})).await?;
        Ok(user.and_then(|u| u.username))
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl Notifier for TelegramClient {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        self.send_message(destination, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn mock_bot_api(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn send_message_posts_chat_id_and_text() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Value>();
        let router = Router::new().route(
            "/botTEST/sendMessage",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    tx.send(body).unwrap();
                    Json(json!({ "ok": true, "result": { "message_id": 1 } }))
                }
            }),
        );
        let base = mock_bot_api(router).await;
        let client = TelegramClient::new("TEST".to_string(), None, format!("{}/", base));

        client.send_message("-1001", "line one\nline two").await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body, json!({ "chat_id": "-1001", "text": "line one\nline two" }));
    }

    #[tokio::test]
    async fn rejected_send_reports_code_and_description() {
        let router = Router::new().route(
            "/botTEST/sendMessage",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "ok": false,
                        "error_code": 400,
                        "description": "Bad Request: chat not found"
                    })),
                )
            }),
        );
        let base = mock_bot_api(router).await;
        let client = TelegramClient::new("TEST".to_string(), None, base);

        match client.send("-1", "hi").await {
            Err(NotifyError::Api { code, description }) => {
                assert_eq!(code, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_response_is_a_decode_error() {
        let router = Router::new().route(
            "/botTEST/sendMessage",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = mock_bot_api(router).await;
        let client = TelegramClient::new("TEST".to_string(), None, base);

        assert!(matches!(
            client.send_message("-1", "hi").await,
            Err(NotifyError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = TelegramClient::new("TEST".to_string(), None, format!("http://{}", addr));

        assert!(matches!(
            client.send_message("-1", "hi").await,
            Err(NotifyError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn hung_send_times_out_as_transport_error() {
        let router = Router::new().route(
            "/botTEST/sendMessage",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "ok": true, "result": {} }))
            }),
        );
        let base = mock_bot_api(router).await;
        let client = TelegramClient::new("TEST".to_string(), None, base)
            .with_timeout(Duration::from_millis(200));

        match client.send("-1", "hi").await {
            Err(NotifyError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_me_returns_username() {
        let router = Router::new().route(
            "/botTEST/getMe",
            post(|| async {
                Json(json!({
                    "ok": true,
                    "result": { "id": 42, "is_bot": true, "username": "alerts_bot" }
                }))
            }),
        );
        let base = mock_bot_api(router).await;
        let client = TelegramClient::new("TEST".to_string(), Some("alerts_bot".to_string()), base);

        assert_eq!(client.get_me().await.unwrap().as_deref(), Some("alerts_bot"));
        assert_eq!(client.bot_username(), Some("alerts_bot"));
    }
}
