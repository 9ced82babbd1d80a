//! Transports that turn a prompt into raw LM text.
//!
//! Two backends ship: an OpenAI-compatible chat completions endpoint reached
//! over HTTP, and a local command that reads the prompt on stdin and prints
//! the answer on stdout (e.g. `llm`, `ollama run`, a wrapper script).
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// One completion request.
#[derive(Debug, Clone)]
pub struct LmRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Anything that can answer an [`LmRequest`] with text.
pub trait LmBackend: Send + Sync {
    fn complete(&self, request: &LmRequest) -> Result<String>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// OpenAI-compatible `/chat/completions` client.
///
/// The credential lives in this value; nothing reads it from ambient state.
pub struct ChatCompletionsBackend {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsBackend {
    pub fn new(api_base: &str, model: &str, api_key: String) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        }
    }
}

impl LmBackend for ChatCompletionsBackend {
    fn complete(&self, request: &LmRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)
            .with_context(|| format!("POST {}", self.endpoint))?;
        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .context("decode chat completion response")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = %self.model,
            "chat completion returned"
        );

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("chat completion returned no message content"))
    }

    fn describe(&self) -> String {
        format!("chat:{}", self.model)
    }
}

/// Local command backend; the prompt is written to the child's stdin.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    argv: Vec<String>,
}

impl CommandBackend {
    /// Parse a shell-style command line such as `ollama run llama3`.
    pub fn parse(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv })
    }
}

impl LmBackend for CommandBackend {
    fn complete(&self, request: &LmRequest) -> Result<String> {
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {}", self.argv[0]))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.system.as_bytes())
                .and_then(|()| stdin.write_all(b"\n\n"))
                .and_then(|()| stdin.write_all(request.prompt.as_bytes()))
                .context("write prompt to LM stdin")?;
        }

        let output = child.wait_with_output().context("wait for LM command")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }

    fn describe(&self) -> String {
        format!("command:{}", self.argv.join(" "))
    }
}
