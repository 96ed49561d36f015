//! Shared test utilities

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use autozap::config::SimulationConfig;
use autozap::reply::{GenerationRequest, ReplyGenerator, TextProvider};
use autozap::{Automation, Console, MemoryStore, PaymentDetails, Result};
use tokio::sync::{Mutex, mpsc};

/// Scripted provider recording every request it receives
pub struct MockProvider {
    reply: Option<String>,
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    /// Provider answering every request with `reply`
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Provider whose every call fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            fail: true,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TextProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        if self.fail {
            return Err(autozap::Error::Provider("mock provider unavailable".to_string()));
        }
        Ok(self.reply.clone())
    }
}

/// Console over a fresh in-memory store, with seeded demo data
#[must_use]
pub fn memory_console(store: &MemoryStore) -> Console {
    Console::open(Arc::new(store.clone()), "Angolan Portuguese", &PaymentDetails::default())
        .expect("failed to open console")
}

/// Automation with no delays plus its notice receiver
pub fn instant_automation(
    store: &MemoryStore,
    provider: Option<Arc<MockProvider>>,
) -> (Automation, mpsc::UnboundedReceiver<autozap::Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let generator = ReplyGenerator::new(provider.map(|p| p as Arc<dyn TextProvider>));
    let automation = Automation::new(
        Arc::new(Mutex::new(memory_console(store))),
        generator,
        SimulationConfig::instant(),
    )
    .with_notices(tx);
    (automation, rx)
}
