//! Remote collaborators: the RPC gateway, file uploads and the auth session.
//!
//! Everything here is injected into the coordinator and the submission flow as trait
//! objects. Futures are not `Send`; the whole client runs on one thread.

mod memory;

pub use memory::{MemoryRpc, MemoryUploader, RecordedCall, StaticSession};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future for remote operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A failed remote call. The message is whatever the gateway or transport reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{endpoint} failed: {message}")]
pub struct RemoteCallError {
    pub endpoint: String,
    pub message: String,
}

impl RemoteCallError {
    pub fn new(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

/// Result type for remote operations.
pub type RpcResult<T> = Result<T, RemoteCallError>;

/// Request body sent to every gateway endpoint.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Value>,
}

/// Response body returned by every gateway endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl RpcResponse {
    /// A present `error` wins over any result; an explicit `null` result reads as no result.
    pub fn into_result(self, endpoint: &str) -> RpcResult<Option<Value>> {
        if let Some(message) = self.error {
            return Err(RemoteCallError::new(endpoint, message));
        }
        Ok(self.result.filter(|v| !v.is_null()))
    }
}

/// Named remote procedures with JSON payloads.
pub trait RpcClient {
    /// Invoke `endpoint`. `auth_override` replaces the session token for this call only.
    fn call(
        &self,
        endpoint: &str,
        payload: Option<Value>,
        auth_override: Option<&str>,
    ) -> BoxFuture<'_, RpcResult<Option<Value>>>;
}

/// Call an endpoint and decode its result.
pub async fn call_typed<R: DeserializeOwned>(
    rpc: &dyn RpcClient,
    endpoint: &str,
    payload: Option<Value>,
) -> RpcResult<Option<R>> {
    match rpc.call(endpoint, payload, None).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| RemoteCallError::new(endpoint, format!("undecodable result: {e}"))),
        None => Ok(None),
    }
}

/// A file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Stores files and hands back a public URL.
pub trait FileUploader {
    fn upload(&self, file: UploadFile, folder: &str) -> BoxFuture<'_, RpcResult<String>>;
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Authentication state as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionUser {
    /// Not determined yet.
    #[default]
    Unknown,
    SignedOut,
    SignedIn(Identity),
}

impl SessionUser {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionUser::SignedIn(identity) => Some(identity),
            SessionUser::Unknown | SessionUser::SignedOut => None,
        }
    }
}

/// Source of bearer tokens and the current identity.
pub trait AuthSession {
    fn token(&self) -> BoxFuture<'_, RpcResult<String>>;

    fn current_user(&self) -> SessionUser;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope() {
        let payload = json!({ "id": "c1" });
        let body = serde_json::to_value(RpcRequest { data: Some(&payload) }).unwrap();
        assert_eq!(body, json!({ "data": { "id": "c1" } }));
        let empty = serde_json::to_value(RpcRequest { data: None }).unwrap();
        assert_eq!(empty, json!({}));
    }

    #[test]
    fn test_response_envelope() {
        let ok: RpcResponse = serde_json::from_value(json!({ "result": [1, 2] })).unwrap();
        assert_eq!(ok.into_result("getClasses"), Ok(Some(json!([1, 2]))));

        let null: RpcResponse = serde_json::from_value(json!({ "result": null })).unwrap();
        assert_eq!(null.into_result("putClass"), Ok(None));

        let failed: RpcResponse =
            serde_json::from_value(json!({ "error": "permission denied", "result": 1 })).unwrap();
        let err = failed.into_result("putClass").unwrap_err();
        assert_eq!(err, RemoteCallError::new("putClass", "permission denied"));
        assert_eq!(err.to_string(), "putClass failed: permission denied");
    }

    #[test]
    fn test_call_typed_decodes() {
        let rpc = MemoryRpc::new();
        rpc.push_response("getNames", Ok(Some(json!(["a", "b"]))));
        rpc.push_response("getNames", Ok(Some(json!({ "not": "a list" }))));

        let names: Option<Vec<String>> =
            futures::executor::block_on(call_typed(&rpc, "getNames", None)).unwrap();
        assert_eq!(names, Some(vec!["a".to_string(), "b".to_string()]));

        let bad = futures::executor::block_on(call_typed::<Vec<String>>(&rpc, "getNames", None));
        assert!(bad.unwrap_err().message.starts_with("undecodable result"));
    }

    #[test]
    fn test_session_identity() {
        let identity = Identity {
            uid: "u1".to_string(),
            email: "t@example.com".to_string(),
        };
        assert_eq!(SessionUser::default().identity(), None);
        assert_eq!(SessionUser::SignedIn(identity.clone()).identity(), Some(&identity));
    }
}
