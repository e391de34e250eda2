//! In-process mock provider.
//!
//! Echoes the conversation deterministically and can be scripted to fail, so
//! routing behaviour can be exercised without a network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use switchyard_abstraction::{
    GenerationOptions, Message, ProviderClient, ProviderError, ProviderKind, ProviderReply, Role,
    TokenUsage,
};
use tracing::debug;

/// Counts whitespace-separated words as a cheap token estimate.
pub(crate) fn count_tokens(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// A deterministic `ProviderClient` for tests and dry runs.
#[derive(Debug)]
pub struct MockClient {
    kind: ProviderKind,
    timeout: Duration,
    delay: Option<Duration>,
    /// Applied to every call once `script` is drained.
    always_fail: Option<ProviderError>,
    /// Per-call outcomes, consumed front to back. `None` means succeed.
    script: Mutex<VecDeque<Option<ProviderError>>>,
    calls: AtomicUsize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// Creates a mock reporting as `ProviderKind::Mock`.
    #[must_use]
    pub fn new() -> Self {
        Self::impersonating(ProviderKind::Mock)
    }

    /// Creates a mock that reports itself as another provider kind.
    #[must_use]
    pub fn impersonating(kind: ProviderKind) -> Self {
        Self {
            kind,
            timeout: kind.default_timeout(),
            delay: None,
            always_fail: None,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes every call fail with `error`.
    #[must_use]
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.always_fail = Some(error);
        self
    }

    /// Queues outcomes for the next calls. `None` entries succeed.
    #[must_use]
    pub fn with_script(self, outcomes: impl IntoIterator<Item = Option<ProviderError>>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(outcomes);
        }
        self
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Overrides the reported timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of times `send` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Option<ProviderError> {
        let scripted = self.script.lock().ok().and_then(|mut script| script.pop_front());
        match scripted {
            Some(outcome) => outcome,
            None => self.always_fail.clone(),
        }
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(
        &self,
        model: &str,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(
            provider = %self.kind,
            model = model,
            message_count = messages.len(),
            options = ?options,
            "MockClient generating reply"
        );

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_outcome() {
            return Err(error);
        }

        let last_user = messages.iter().rev().find(|m| m.role == Role::User);
        let content = format!(
            "[{}:{}] {}",
            self.kind,
            model,
            last_user.map_or("", |m| m.content.as_str())
        );

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum();
        let completion_tokens = count_tokens(&content);

        Ok(ProviderReply { content, usage: TokenUsage::new(prompt_tokens, completion_tokens) })
    }
}
