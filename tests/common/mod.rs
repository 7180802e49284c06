//! Common test utilities for reconciler integration tests
//!
//! Provides a scripted in-memory webhook gateway, certificate fixtures and
//! small polling helpers.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use webhook_ca_updater::error::GatewayError;
use webhook_ca_updater::gateway::WebhookGateway;

/// Outcome the fake gateway returns for one `apply_ca_bundle` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Ok,
    NotFound,
    Transient,
}

/// In-memory gateway that records every call
///
/// Calls consume the script front to back; once it is empty every call succeeds.
#[derive(Debug, Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<(String, Vec<u8>)>>,
    script: Mutex<VecDeque<Scripted>>,
    missing: AtomicBool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outcomes: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Each call sleeps for `delay` before returning
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make `exists` report the webhook configuration as absent
    pub fn missing(self) -> Self {
        self.missing.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of `apply_ca_bundle` calls ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookGateway for FakeGateway {
    async fn exists(&self, _name: &str) -> bool {
        !self.missing.load(Ordering::SeqCst)
    }

    async fn apply_ca_bundle(&self, name: &str, bundle: &[u8]) -> Result<(), GatewayError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), bundle.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(Scripted::Ok);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match outcome {
            Scripted::Ok => Ok(()),
            Scripted::NotFound => Err(GatewayError::NotFound {
                name: name.to_string(),
            }),
            Scripted::Transient => Err(GatewayError::NoWebhooks {
                name: name.to_string(),
            }),
        }
    }
}

/// PEM for a fresh self-signed certificate
pub fn cert_pem(host: &str) -> String {
    rcgen::generate_simple_self_signed(vec![host.to_string()])
        .unwrap()
        .cert
        .pem()
}

/// Two concatenated certificates, as a CA bundle with a rotation overlap
pub fn two_cert_bundle() -> Vec<u8> {
    format!("{}{}", cert_pem("old-ca.example.com"), cert_pem("new-ca.example.com")).into_bytes()
}

/// Replace `dir/name` the way certificate managers do: write aside, then rename
pub fn rotate(dir: &Path, name: &str, contents: &[u8]) {
    let staging = dir.join(format!(".{name}.tmp"));
    std::fs::write(&staging, contents).unwrap();
    std::fs::rename(&staging, dir.join(name)).unwrap();
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
