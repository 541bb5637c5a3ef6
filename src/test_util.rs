use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::providers::{Provider, ProviderFuture, ProviderResponse, ToolSpec};

static HOME_LOCK: Mutex<()> = Mutex::new(());

/// Puts HOME back when dropped, even if the test body panicked.
struct HomeRestore(Option<String>);

impl Drop for HomeRestore {
    fn drop(&mut self) {
        // SAFETY: callers hold HOME_LOCK for the guard's whole lifetime.
        match self.0.take() {
            Some(home) => unsafe { std::env::set_var("HOME", home) },
            None => unsafe { std::env::remove_var("HOME") },
        }
    }
}

/// Runs `func` with HOME pointing at a fresh temporary directory.
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let _lock = HOME_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let _restore = HomeRestore(std::env::var("HOME").ok());
    // SAFETY: HOME_LOCK is held.
    unsafe { std::env::set_var("HOME", dir.path()) };
    func(dir.path())
}

/// What a [`RecordingProvider`] saw when `call_tool` ran.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedCall {
    pub(crate) tool_name: String,
    pub(crate) tools: Vec<String>,
    pub(crate) system: Vec<String>,
    pub(crate) user: Vec<String>,
    pub(crate) max_tokens: Option<u32>,
}

/// Provider that answers every tool call with fixed arguments and keeps the
/// assembled request for inspection.
#[derive(Debug, Clone)]
pub(crate) struct RecordingProvider {
    args: Value,
    tools: Vec<String>,
    system: Vec<String>,
    user: Vec<String>,
    max_tokens: Option<u32>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl RecordingProvider {
    pub(crate) fn replying(args: Value) -> Self {
        Self {
            args,
            tools: Vec::new(),
            system: Vec::new(),
            user: Vec::new(),
            max_tokens: None,
            calls: Arc::default(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Provider for RecordingProvider {
    fn append_system_input(mut self, input: String) -> Self {
        self.system.push(input);
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.user.push(input);
        self
    }

    fn register_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool.name);
        self
    }

    fn limit_output_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn call_tool(self, tool_name: &str) -> ProviderFuture {
        self.calls.lock().unwrap().push(RecordedCall {
            tool_name: tool_name.to_string(),
            tools: self.tools,
            system: self.system,
            user: self.user,
            max_tokens: self.max_tokens,
        });
        let args = self.args;
        Box::pin(async move {
            Ok(ProviderResponse {
                args,
                model: Some("recording".to_string()),
                usage: None,
            })
        })
    }
}
