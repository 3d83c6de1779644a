use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::domain::{Analysis, JsonKind, SampleRecord};
use crate::error::SeqRemoteError;

/// Everything the workflow needs from the analysis service.
pub trait RemoteClient: Send + Sync {
    fn upload(&self, path: &Path) -> Result<(), SeqRemoteError>;
    fn list_samples(&self) -> Result<Vec<SampleRecord>, SeqRemoteError>;
    fn list_analyses(&self) -> Result<Vec<Analysis>, SeqRemoteError>;
    fn fetch_json(&self, analysis_id: &str, kind: JsonKind) -> Result<Value, SeqRemoteError>;
    fn download_raw(&self, analysis_id: &str, destination: &Path) -> Result<(), SeqRemoteError>;
}

#[derive(Clone)]
pub struct OneCodexHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
    upload_timeout: std::time::Duration,
}

impl OneCodexHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, SeqRemoteError> {
        if config.api_key.trim().is_empty() {
            return Err(SeqRemoteError::MissingApiKey);
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("seqremote/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SeqRemoteError::RemoteHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| SeqRemoteError::RemoteHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            upload_timeout: config.upload_timeout,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.api_key, Some(""))
    }

    fn send(request: RequestBuilder) -> Result<Response, SeqRemoteError> {
        let response = request
            .send()
            .map_err(|err| SeqRemoteError::RemoteHttp(err.to_string()))?;
        Self::handle_status(response)
    }

    fn handle_status(response: Response) -> Result<Response, SeqRemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "remote request failed".to_string());
        Err(SeqRemoteError::RemoteStatus { status, message })
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SeqRemoteError> {
        debug!(path, "GET");
        let response = Self::send(self.get(path))?;
        response
            .json()
            .map_err(|err| SeqRemoteError::MalformedResponse(err.to_string()))
    }
}

impl RemoteClient for OneCodexHttpClient {
    fn upload(&self, path: &Path) -> Result<(), SeqRemoteError> {
        debug!(path = %path.display(), "uploading sample");
        let form = Form::new().file("file", path).map_err(|err| {
            SeqRemoteError::Filesystem(format!("open {}: {err}", path.display()))
        })?;
        let request = self
            .authorize(self.client.post(self.url("upload")))
            .timeout(self.upload_timeout)
            .multipart(form);
        Self::send(request)?;
        Ok(())
    }

    fn list_samples(&self) -> Result<Vec<SampleRecord>, SeqRemoteError> {
        self.get_json("samples")
    }

    fn list_analyses(&self) -> Result<Vec<Analysis>, SeqRemoteError> {
        self.get_json("analyses")
    }

    fn fetch_json(&self, analysis_id: &str, kind: JsonKind) -> Result<Value, SeqRemoteError> {
        self.get_json(&json_path(analysis_id, kind))
    }

    fn download_raw(&self, analysis_id: &str, destination: &Path) -> Result<(), SeqRemoteError> {
        let path = format!("analyses/{analysis_id}/raw");
        debug!(path = %path, destination = %destination.display(), "downloading raw output");
        let mut response = Self::send(self.get(&path))?;
        let mut file = File::create(destination).map_err(|err| {
            SeqRemoteError::Filesystem(format!("create {}: {err}", destination.display()))
        })?;
        let bytes = copy_body(&mut response, &mut file, destination)?;
        debug!(bytes, "raw output written");
        Ok(())
    }
}

/// Stream a response body to disk. Read failures are transport errors,
/// write failures are local ones.
fn copy_body(
    body: &mut impl Read,
    file: &mut impl Write,
    destination: &Path,
) -> Result<u64, SeqRemoteError> {
    let mut buffer = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(SeqRemoteError::RemoteHttp(err.to_string())),
        };
        file.write_all(&buffer[..read]).map_err(|err| {
            SeqRemoteError::Filesystem(format!("write {}: {err}", destination.display()))
        })?;
        total += read as u64;
    }
    file.flush().map_err(|err| {
        SeqRemoteError::Filesystem(format!("write {}: {err}", destination.display()))
    })?;
    Ok(total)
}

pub fn json_path(analysis_id: &str, kind: JsonKind) -> String {
    match kind {
        JsonKind::Summary => format!("analyses/{analysis_id}"),
        JsonKind::Table => format!("analyses/{analysis_id}/table"),
    }
}
