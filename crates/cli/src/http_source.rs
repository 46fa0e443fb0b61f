use async_trait::async_trait;
use gitreader_graph::{GraphError, GraphSource};
use gitreader_protocol::{GraphPayload, FULL_SCOPE};
use reqwest::Client;

/// Fetches scope payloads from a running gitreader analysis service.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn graph_url(&self) -> String {
        format!("{}/gitreader/api/graph", self.base_url)
    }
}

#[async_trait]
impl GraphSource for HttpSource {
    async fn fetch_graph(&self, scope: &str) -> gitreader_graph::Result<GraphPayload> {
        let url = self.graph_url();
        let mut request = self.client.get(&url);
        if scope != FULL_SCOPE {
            request = request.query(&[("scope", scope)]);
        }
        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| GraphError::source_failure(scope, format!("GET {url}: {err}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|err| GraphError::source_failure(scope, format!("GET {url}: {err}")))?;
        let payload: GraphPayload = serde_json::from_slice(&body)?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_url_ignores_trailing_slash() {
        let source = HttpSource::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(source.graph_url(), "http://127.0.0.1:5000/gitreader/api/graph");
    }

    #[tokio::test]
    async fn unreachable_service_reports_scope() {
        let source = HttpSource::new("http://127.0.0.1:9").unwrap();
        let err = source.fetch_graph("group:app").await.unwrap_err();
        assert!(err.to_string().contains("group:app"));
    }
}
