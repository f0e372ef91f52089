//! In-memory collaborators for tests and offline use.

use super::{
    AuthSession, BoxFuture, FileUploader, RemoteCallError, RpcClient, RpcResult, SessionUser,
    UploadFile,
};
use futures::channel::oneshot;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// A call seen by [`MemoryRpc`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub payload: Option<Value>,
    pub auth_override: Option<String>,
}

#[derive(Default)]
struct MemoryRpcState {
    calls: Vec<RecordedCall>,
    scripted: HashMap<String, VecDeque<RpcResult<Option<Value>>>>,
    hold: bool,
    held: Vec<(usize, oneshot::Sender<RpcResult<Option<Value>>>)>,
}

/// RPC client that records every call.
///
/// Responses come from a per-endpoint script (an empty script answers `Ok(None)`). With
/// [`hold_responses`](Self::hold_responses) enabled every call stays pending until released,
/// which lets tests resolve calls in any order.
#[derive(Default)]
pub struct MemoryRpc {
    state: RefCell<MemoryRpcState>,
}

impl MemoryRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next unanswered call to `endpoint`.
    pub fn push_response(&self, endpoint: &str, response: RpcResult<Option<Value>>) {
        self.state
            .borrow_mut()
            .scripted
            .entry(endpoint.to_string())
            .or_default()
            .push_back(response);
    }

    /// Keep every subsequent call pending until it is released.
    pub fn hold_responses(&self) {
        self.state.borrow_mut().hold = true;
    }

    /// Resolve the held call with the given call index. Returns false if it is not pending.
    pub fn release(&self, call_index: usize, response: RpcResult<Option<Value>>) -> bool {
        let sender = {
            let mut state = self.state.borrow_mut();
            let Some(pos) = state.held.iter().position(|(i, _)| *i == call_index) else {
                return false;
            };
            state.held.remove(pos).1
        };
        sender.send(response).is_ok()
    }

    /// Resolve every held call with `Ok(None)`, oldest first.
    pub fn release_all(&self) {
        let held = std::mem::take(&mut self.state.borrow_mut().held);
        for (_, sender) in held {
            let _ = sender.send(Ok(None));
        }
    }

    /// Indexes of calls still waiting for a response.
    pub fn pending(&self) -> Vec<usize> {
        self.state.borrow().held.iter().map(|(i, _)| *i).collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<RecordedCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }
}

impl RpcClient for MemoryRpc {
    fn call(
        &self,
        endpoint: &str,
        payload: Option<Value>,
        auth_override: Option<&str>,
    ) -> BoxFuture<'_, RpcResult<Option<Value>>> {
        let endpoint = endpoint.to_string();
        let mut state = self.state.borrow_mut();
        let index = state.calls.len();
        state.calls.push(RecordedCall {
            endpoint: endpoint.clone(),
            payload,
            auth_override: auth_override.map(str::to_string),
        });
        log::trace!("memory rpc call #{index} to {endpoint}");

        if state.hold {
            let (tx, rx) = oneshot::channel();
            state.held.push((index, tx));
            return Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(RemoteCallError::new(endpoint, "call abandoned")))
            });
        }

        let response = state
            .scripted
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(None));
        Box::pin(async move { response })
    }
}

/// Uploader that keeps files in memory and returns `memory://<folder>/<name>` URLs.
#[derive(Default)]
pub struct MemoryUploader {
    files: RefCell<HashMap<String, UploadFile>>,
    fail_next: RefCell<Option<String>>,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_next.borrow_mut() = Some(message.into());
    }

    pub fn get(&self, url: &str) -> Option<UploadFile> {
        self.files.borrow().get(url).cloned()
    }

    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.files.borrow().keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl FileUploader for MemoryUploader {
    fn upload(&self, file: UploadFile, folder: &str) -> BoxFuture<'_, RpcResult<String>> {
        let folder = folder.trim_matches('/').to_string();
        Box::pin(async move {
            if let Some(message) = self.fail_next.borrow_mut().take() {
                return Err(RemoteCallError::new("upload", message));
            }
            let url = format!("memory://{}/{}", folder, file.name);
            self.files.borrow_mut().insert(url.clone(), file);
            Ok(url)
        })
    }
}

/// Fixed session, e.g. from a token passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: SessionUser,
    token: Option<String>,
}

impl StaticSession {
    pub fn new(user: SessionUser, token: Option<String>) -> Self {
        Self { user, token }
    }

    pub fn signed_out() -> Self {
        Self::new(SessionUser::SignedOut, None)
    }
}

impl AuthSession for StaticSession {
    fn token(&self) -> BoxFuture<'_, RpcResult<String>> {
        let token = self
            .token
            .clone()
            .ok_or_else(|| RemoteCallError::new("auth", "not signed in"));
        Box::pin(async move { token })
    }

    fn current_user(&self) -> SessionUser {
        self.user.clone()
    }
}
