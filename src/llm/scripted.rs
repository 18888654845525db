//! Scripted client for tests: replays canned replies in order and records every prompt.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenerationError, GenerativeClient};

/// One recorded `generate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system: String,
    pub user: String,
}

#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// Queue a failing call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, item: Result<String, String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(item);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl GenerativeClient for ScriptedClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(RecordedCall {
                system: system.to_string(),
                user: user.to_string(),
            });
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GenerationError::Provider(message)),
            None => Err(GenerationError::Provider("script exhausted".into())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
