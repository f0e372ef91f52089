//! JSON-over-HTTP gateway client.

use crate::config::ApiConfig;
use crate::{ClientError, ClientResult};
use reqwest::StatusCode;
use seek_core::remote::{
    AuthSession, BoxFuture, RemoteCallError, RpcClient, RpcRequest, RpcResponse, RpcResult,
};
use serde_json::Value;
use std::rc::Rc;

/// Calls gateway functions with `POST {"data": ...}` and a bearer token.
pub struct HttpRpcClient {
    client: reqwest::Client,
    config: ApiConfig,
    session: Rc<dyn AuthSession>,
}

impl HttpRpcClient {
    pub fn new(config: ApiConfig, session: Rc<dyn AuthSession>) -> Self {
        Self::with_client(reqwest::Client::new(), config, session)
    }

    pub fn with_client(client: reqwest::Client, config: ApiConfig, session: Rc<dyn AuthSession>) -> Self {
        Self {
            client,
            config,
            session,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn post(
        &self,
        endpoint: &str,
        payload: Option<&Value>,
        auth_override: Option<&str>,
    ) -> ClientResult<Option<Value>> {
        let url = self.config.endpoint_url(endpoint);
        let token = match auth_override {
            Some(token) => Some(token.to_string()),
            None => match self.session.token().await {
                Ok(token) => Some(token),
                Err(e) => {
                    log::debug!("calling {endpoint} without a token: {e}");
                    None
                }
            },
        };

        let mut request = self.client.post(&url).json(&RpcRequest { data: payload });
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        log::debug!("POST {url}");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        interpret_response(endpoint, status, &body)
    }
}

/// Turn a raw gateway reply into the call result.
///
/// The envelope's `error` is authoritative whenever the body parses; the status code only
/// matters for bodies that are not an envelope.
pub(crate) fn interpret_response(
    endpoint: &str,
    status: StatusCode,
    body: &str,
) -> ClientResult<Option<Value>> {
    match serde_json::from_str::<RpcResponse>(body) {
        Ok(envelope) => envelope.into_result(endpoint).map_err(ClientError::Remote),
        Err(_) if !status.is_success() => Err(ClientError::Status {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        }),
        Err(e) => {
            log::error!("{endpoint}: reply is not a gateway envelope: {e}");
            Err(ClientError::Decode(e.to_string()))
        }
    }
}

impl RpcClient for HttpRpcClient {
    fn call(
        &self,
        endpoint: &str,
        payload: Option<Value>,
        auth_override: Option<&str>,
    ) -> BoxFuture<'_, RpcResult<Option<Value>>> {
        let endpoint = endpoint.to_string();
        let auth_override = auth_override.map(str::to_string);
        Box::pin(async move {
            self.post(&endpoint, payload.as_ref(), auth_override.as_deref())
                .await
                .map_err(|e| e.into_remote(&endpoint))
        })
    }
}
