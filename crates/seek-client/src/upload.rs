//! Multipart file upload client.

use crate::{ClientError, ClientResult};
use reqwest::multipart::{Form, Part};
use seek_core::remote::{AuthSession, BoxFuture, FileUploader, RpcResult, UploadFile};
use serde::Deserialize;
use std::rc::Rc;

/// Endpoint name used in errors raised by the uploader.
const UPLOAD_ENDPOINT: &str = "upload";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Posts files as `multipart/form-data` with `file` and `folder` fields.
pub struct HttpUploader {
    client: reqwest::Client,
    upload_url: String,
    session: Rc<dyn AuthSession>,
}

impl HttpUploader {
    pub fn new(upload_url: impl Into<String>, session: Rc<dyn AuthSession>) -> Self {
        Self::with_client(reqwest::Client::new(), upload_url, session)
    }

    pub fn with_client(
        client: reqwest::Client,
        upload_url: impl Into<String>,
        session: Rc<dyn AuthSession>,
    ) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
            session,
        }
    }

    async fn send(&self, file: UploadFile, folder: &str) -> ClientResult<String> {
        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.content_type)?;
        let form = Form::new().text("folder", folder.to_string()).part("file", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Ok(token) = self.session.token().await {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                endpoint: UPLOAD_ENDPOINT.to_string(),
            });
        }
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        log::info!("uploaded to {}", body.url);
        Ok(body.url)
    }
}

impl FileUploader for HttpUploader {
    fn upload(&self, file: UploadFile, folder: &str) -> BoxFuture<'_, RpcResult<String>> {
        let folder = folder.to_string();
        Box::pin(async move {
            self.send(file, &folder)
                .await
                .map_err(|e| e.into_remote(UPLOAD_ENDPOINT))
        })
    }
}
