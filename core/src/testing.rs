//! Test doubles shared by unit tests

use crate::request::Request;
use crate::traits::{Transport, TransportError, TransportResponse};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock does for a given URL
#[derive(Debug, Clone)]
pub(crate) enum MockBehavior {
    Status(u16),
    Error(TransportError),
    Delay(Duration),
    Panic,
}

/// Transport that answers from a table and records concurrency
pub(crate) struct MockTransport {
    delay: Option<Duration>,
    behaviors: HashMap<String, MockBehavior>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            delay: None,
            behaviors: HashMap::new(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn with_behavior(mut self, url: &str, behavior: MockBehavior) -> Self {
        self.behaviors.insert(url.to_string(), behavior);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<Request> {
        self.seen.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behaviors.get(&request.url) {
            None => Ok(TransportResponse::new(200, b"ok".to_vec())),
            Some(MockBehavior::Status(status)) => Ok(TransportResponse::new(*status, Vec::new())),
            Some(MockBehavior::Error(e)) => Err(e.clone()),
            Some(MockBehavior::Delay(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(TransportResponse::new(200, b"slow".to_vec()))
            }
            Some(MockBehavior::Panic) => panic!("mock transport panic for {}", request.url),
        }
    }
}
