//! Test doubles shared by the unit tests.

use crate::api::build_rocket;
use crate::background::notifier::{FailureNotice, NotificationSink, NotifierHandle};
use crate::background::processors::analyze::ResultAnalyzer;
use crate::background::processors::fetch::ImageFetcher;
use crate::background::processors::recognize::{RecognitionError, Recognizer};
use crate::database::{CacheStore, JobRecordStore, RedbStore};
use crate::models::{CacheEntry, JobRecord, JobRequest};
use crate::workflow::JobOrchestrator;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::JoinHandle;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

pub struct ScriptedFetcher(Result<Vec<u8>, String>);

impl ScriptedFetcher {
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self(Ok(bytes))
    }

    pub fn failing(message: &str) -> Self {
        Self(Err(message.to_string()))
    }
}

#[async_trait]
impl ImageFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        self.0.clone().map_err(|message| anyhow!(message))
    }
}

enum Script {
    Text(String),
    Fail(String),
}

/// Returns a fixed outcome and counts calls. A gated recognizer holds each
/// call until a permit is added to its gate.
pub struct ScriptedRecognizer {
    script: Script,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl ScriptedRecognizer {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::with_script(Script::Text(text.to_string()))
    }

    pub fn failing(diagnostics: &str) -> Self {
        Self::with_script(Script::Fail(diagnostics.to_string()))
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone().unwrap()
    }

    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, _image: Vec<u8>) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match &self.script {
            Script::Text(text) => Ok(text.clone()),
            Script::Fail(diagnostics) => Err(RecognitionError::Execution {
                status: "exit status: 1".to_string(),
                diagnostics: diagnostics.clone(),
            }),
        }
    }
}

/// In-memory redb store that can be told to refuse either kind of write.
pub struct FlakyStore {
    pub inner: RedbStore,
    fail_records: bool,
    fail_cache: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: RedbStore::in_memory().unwrap(),
            fail_records: false,
            fail_cache: false,
        }
    }

    pub fn failing_records(mut self) -> Self {
        self.fail_records = true;
        self
    }

    pub fn failing_cache(mut self) -> Self {
        self.fail_cache = true;
        self
    }
}

impl JobRecordStore for FlakyStore {
    fn put_job_record(&self, record: &JobRecord) -> Result<()> {
        if self.fail_records {
            bail!("disk full");
        }
        self.inner.put_job_record(record)
    }
}

impl CacheStore for FlakyStore {
    fn put_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        if self.fail_cache {
            bail!("cache table unavailable");
        }
        self.inner.put_cache_entry(entry)
    }
}

pub struct ScriptedAnalyzer {
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _result: &CacheEntry, _request: &JobRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("analysis API returned 503 Service Unavailable");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<FailureNotice>>);

impl RecordingSink {
    pub fn delivered(&self) -> Vec<FailureNotice> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notice: &FailureNotice) -> Result<()> {
        self.0.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Rocket client over the real routes, with scripted collaborators and an
/// in-memory store.
pub async fn test_client(
    fetcher: ScriptedFetcher,
    recognizer: ScriptedRecognizer,
) -> (rocket::local::asynchronous::Client, Arc<RedbStore>) {
    let (client, store, _notices) = test_client_with_notices(fetcher, recognizer).await;
    (client, store)
}

/// Same as [`test_client`], with failure notices readable from the receiver.
pub async fn test_client_with_notices(
    fetcher: ScriptedFetcher,
    recognizer: ScriptedRecognizer,
) -> (
    rocket::local::asynchronous::Client,
    Arc<RedbStore>,
    mpsc::Receiver<FailureNotice>,
) {
    let store = Arc::new(RedbStore::in_memory().unwrap());
    let (handle, notices) = NotifierHandle::channel(16);
    let orchestrator = JobOrchestrator::new(
        Arc::new(fetcher),
        Arc::new(recognizer),
        store.clone(),
        store.clone(),
    )
    .with_notifier(handle);
    let rocket = build_rocket(rocket::Config::figment(), Arc::new(orchestrator), store.clone());
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .unwrap();
    (client, store, notices)
}

/// Answer exactly one HTTP request on a local port with `response` (raw
/// bytes, status line included), then close the connection.
///
/// Returns the base URL and a handle resolving to the raw request received.
pub async fn serve_once(response: Vec<u8>) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let _ = stream.write_all(&response).await;
        let _ = stream.shutdown().await;
        request
    });
    (url, task)
}

async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut request = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        let read = stream.read(&mut buffer).await.unwrap();
        if read == 0 {
            return request;
        }
        request.extend_from_slice(&buffer[..read]);

        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + body_len {
            return request;
        }
    }
}

/// A complete HTTP/1.1 response with a Content-Length header.
pub fn http_response(status: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        status,
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}
