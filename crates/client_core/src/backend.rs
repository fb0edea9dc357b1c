//! Collaborator seam: the remote processing server.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::protocol::{Acknowledgement, StatusSnapshot};
use url::Url;

use crate::archive::ArchiveFile;

const ARCHIVE_MIME_TYPE: &str = "application/zip";

#[async_trait]
pub trait ProcessingBackend: Send + Sync {
    async fn upload(&self, file: &ArchiveFile) -> Result<Acknowledgement>;
    async fn start_processing(&self) -> Result<Acknowledgement>;
    async fn fetch_status(&self) -> Result<StatusSnapshot>;
    async fn reset(&self) -> Result<()>;
    async fn download(&self) -> Result<Vec<u8>>;
    fn download_url(&self) -> Url;
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(server_url.trim())
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("server url '{server_url}' cannot be used as a base"));
        }
        // Endpoint names are appended directly to the base path.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}{name}", self.base_url.path());
        url.set_path(&path);
        url
    }
}

#[async_trait]
impl ProcessingBackend for HttpBackend {
    async fn upload(&self, file: &ArchiveFile) -> Result<Acknowledgement> {
        let bytes = file.read_bytes().await?;
        let part = Part::bytes(bytes)
            .file_name(file.name().to_string())
            .mime_str(ARCHIVE_MIME_TYPE)?;
        let form = Form::new().part("file", part);

        // Rejections arrive as JSON bodies on non-2xx statuses too.
        let ack = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;
        Ok(ack)
    }

    async fn start_processing(&self) -> Result<Acknowledgement> {
        let ack = self
            .http
            .post(self.endpoint("process"))
            .send()
            .await?
            .json()
            .await?;
        Ok(ack)
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot> {
        let snapshot = self
            .http
            .get(self.endpoint("status"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(snapshot)
    }

    async fn reset(&self) -> Result<()> {
        self.http
            .post(self.endpoint("reset"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn download(&self) -> Result<Vec<u8>> {
        let bytes = self
            .http
            .get(self.endpoint("download"))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    fn download_url(&self) -> Url {
        self.endpoint("download")
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
