use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::MarkerError;
use crate::store::RemoteStore;

#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self, MarkerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("marker-genes/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MarkerError::Filesystem(err.to_string()))?,
        );
        if let Ok(token) = std::env::var("MARKER_GENES_STORE_TOKEN") {
            if !token.trim().is_empty() {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                        .map_err(|err| MarkerError::Filesystem(err.to_string()))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| MarkerError::Remote {
                op: "connect",
                key: base_url.to_string(),
                message: err.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn send(
        &self,
        op: &'static str,
        key: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response, MarkerError> {
        request.send().map_err(|err| MarkerError::Remote {
            op,
            key: key.to_string(),
            message: err.to_string(),
        })
    }
}

impl RemoteStore for HttpStore {
    fn exists(&self, key: &str) -> Result<bool, MarkerError> {
        let response = self.send("exists", key, self.client.head(self.url_for(key)))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error("exists", key, status)),
        }
    }

    fn get(&self, key: &str, destination: &Path) -> Result<(), MarkerError> {
        let mut response = self.send("get", key, self.client.get(self.url_for(key)))?;
        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(MarkerError::RemoteNotFound(key.to_string())),
            status => return Err(status_error("get", key, status)),
        }
        let mut file =
            File::create(destination).map_err(|err| MarkerError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file).map_err(|err| MarkerError::Remote {
            op: "get",
            key: key.to_string(),
            message: err.to_string(),
        })?;
        Ok(())
    }

    fn put(&self, source: &Path, key: &str) -> Result<(), MarkerError> {
        let file = File::open(source).map_err(|err| {
            MarkerError::Filesystem(format!("open {}: {err}", source.display()))
        })?;
        let response = self.send("put", key, self.client.put(self.url_for(key)).body(file))?;
        if response.status().is_success() {
            return Ok(());
        }
        Err(status_error("put", key, response.status()))
    }

    fn remove(&self, key: &str) -> Result<(), MarkerError> {
        let response = self.send("remove", key, self.client.delete(self.url_for(key)))?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            status => Err(status_error("remove", key, status)),
        }
    }
}

fn status_error(op: &'static str, key: &str, status: StatusCode) -> MarkerError {
    MarkerError::RemoteStatus {
        op,
        key: key.to_string(),
        status: status.as_u16(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_key_without_double_slash() {
        let store = HttpStore::new("https://objects.example.org/igg/").unwrap();
        assert_eq!(
            store.url_for("/gene_annotations/100001/G1/G1.faa.gz"),
            "https://objects.example.org/igg/gene_annotations/100001/G1/G1.faa.gz"
        );
    }
}
