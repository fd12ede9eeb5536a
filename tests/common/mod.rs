//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use config_relay::merge::MergePlan;
use config_relay::source::{DocumentFormat, RawDocument, SourceAdapter, SourceError};

/// What the mock backend saw.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub path: String,
    pub authorization: Option<String>,
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` maps each request to a status code and body.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(&MockRequest) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let mut reader = BufReader::new(read);

                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let path = line.split_whitespace().nth(1).unwrap_or("/").to_string();

                let mut authorization = None;
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).await.unwrap_or(0) == 0 {
                        break;
                    }
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("authorization") {
                            authorization = Some(value.trim().to_string());
                        }
                    }
                }

                let (status, body) = f(&MockRequest { path, authorization });
                let status_text = match status {
                    200 => "200 OK",
                    401 => "401 Unauthorized",
                    403 => "403 Forbidden",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = write.write_all(response.as_bytes()).await;
                let _ = write.shutdown().await;
            });
        }
    });

    addr
}

/// One scripted response of a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum Step {
    /// `(profile, yaml body)` pairs.
    Documents(Vec<(&'static str, &'static str)>),
    /// Fail with a fetch error.
    Fail(&'static str),
    /// Never answer; only a timeout ends the fetch.
    Hang,
}

/// A source replaying a script, one step per fetch. The last step repeats.
pub struct ScriptedSource {
    name: &'static str,
    delay: Duration,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedSource {
    pub fn new(name: &'static str, steps: Vec<Step>) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            script: Mutex::new(steps.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Delay every fetch by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter of fetch calls.
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = script.pop_front() {
            *last = Some(step);
        }
        last.clone().unwrap_or(Step::Documents(Vec::new()))
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn fetch(&self, plan: &MergePlan) -> Result<Vec<RawDocument>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match step {
            Step::Documents(docs) => Ok(docs
                .into_iter()
                .filter(|(profile, _)| plan.position(profile).is_some())
                .map(|(profile, body)| RawDocument {
                    origin: format!("{}:{}", self.name, profile),
                    format: DocumentFormat::Yaml,
                    profile: profile.to_string(),
                    source_index: 0,
                    bytes: body.as_bytes().to_vec(),
                })
                .collect()),
            Step::Fail(message) => Err(SourceError::Fetch {
                location: self.describe(),
                message: message.to_string(),
            }),
            Step::Hang => std::future::pending().await,
        }
    }

    fn describe(&self) -> String {
        format!("scripted:{}", self.name)
    }
}
