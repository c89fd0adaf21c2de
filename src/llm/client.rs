use crate::config::Config;
use crate::util::truncate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Maximum length for error bodies carried in [`LlmError::Status`]
const MAX_ERROR_CONTENT_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model call timed out after {secs} seconds")]
    Timeout { secs: u64 },
    #[error("could not reach model service at {endpoint}")]
    Unreachable { endpoint: String },
    #[error("model service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("failed to decode model response: {0}")]
    Decode(String),
    #[error("model request failed: {0}")]
    Request(String),
}

/// Anything that can turn a prompt into model output text.
pub trait PromptSender {
    fn send_prompt(&self, prompt: &str) -> impl Future<Output = Result<String, LlmError>> + Send;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    url: Url,
    endpoint: String,
    model: String,
    options: BTreeMap<String, Value>,
    timeout_secs: u64,
}

/// Create a configured HTTP client for model requests
fn create_http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

impl OllamaClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            http: create_http_client(config.timeout_secs)?,
            url: config.generate_url()?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            options: config.model_options.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn map_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                secs: self.timeout_secs,
            }
        } else if err.is_connect() {
            LlmError::Unreachable {
                endpoint: self.endpoint.clone(),
            }
        } else if err.is_decode() {
            LlmError::Decode(err.to_string())
        } else {
            LlmError::Request(err.to_string())
        }
    }
}

impl PromptSender for OllamaClient {
    async fn send_prompt(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: &self.options,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_error(e))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                code: status.as_u16(),
                body: truncate(text.trim(), MAX_ERROR_CONTENT_LEN),
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Decode(e.to_string()))?;

        tracing::debug!(
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = parsed.response.len(),
            "model call completed"
        );

        Ok(parsed.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve exactly one HTTP request, replying with `status` and `body`
    /// after `delay`. The raw request is sent back over the channel.
    fn serve_once(status: &'static str, body: String, delay: Duration) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let _ = tx.send(request);
            thread::sleep(delay);
            let reply = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(reply.as_bytes());
        });

        (format!("http://{addr}"), rx)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client_for(endpoint: String, timeout_secs: u64) -> OllamaClient {
        let config = Config {
            endpoint,
            timeout_secs,
            ..Config::default()
        };
        OllamaClient::new(&config).unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let options = Config::default().model_options;
        let request = GenerateRequest {
            model: "phi3:mini",
            prompt: "why did CI fail?",
            stream: false,
            options: &options,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "phi3:mini");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_ctx"], 4096);
        assert_eq!(value["options"]["temperature"], 0.1);
    }

    #[tokio::test]
    async fn test_send_prompt_returns_trimmed_response() {
        let body = serde_json::json!({"model": "phi3:mini", "response": "  {\"summary\":\"ok\"}\n", "done": true}).to_string();
        let (endpoint, requests) = serve_once("200 OK", body, Duration::ZERO);
        let client = client_for(endpoint, 5);

        let text = client.send_prompt("explain").await.unwrap();
        assert_eq!(text, "{\"summary\":\"ok\"}");

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /api/generate "));
        assert!(request.contains("\"prompt\":\"explain\""));
        assert!(request.contains("\"stream\":false"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let body = r#"{"error":"model 'nope' not found"}"#.to_string();
        let (endpoint, _requests) = serve_once("404 Not Found", body, Duration::ZERO);
        let client = client_for(endpoint, 5);

        match client.send_prompt("explain").await {
            Err(LlmError::Status { code, body }) => {
                assert_eq!(code, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let (endpoint, _requests) = serve_once("200 OK", "not json".to_string(), Duration::ZERO);
        let client = client_for(endpoint, 5);
        assert!(matches!(
            client.send_prompt("explain").await,
            Err(LlmError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let (endpoint, _requests) =
            serve_once("200 OK", r#"{"response":"late"}"#.to_string(), Duration::from_secs(3));
        let client = client_for(endpoint, 1);
        assert!(matches!(
            client.send_prompt("explain").await,
            Err(LlmError::Timeout { secs: 1 })
        ));
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{addr}"), 5);
        match client.send_prompt("explain").await {
            Err(LlmError::Unreachable { endpoint }) => {
                assert_eq!(endpoint, format!("http://{addr}"));
            }
            other => panic!("expected unreachable, got {other:?}"),
        }
    }
}
