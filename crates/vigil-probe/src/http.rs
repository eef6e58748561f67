use reqwest::{Client, Method, Url};
use std::time::Duration;
use tracing::debug;
use vigil_core::probe::{Probe, ProbeStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest diagnostic text captured from a response body.
const MAX_RESPONSE_TEXT: usize = 256;

/// HTTP implementation of the probe contract: one bounded request per
/// check, up means the status code equals the configured success code.
pub struct HttpProbe {
    name: String,
    url: Url,
    method: Method,
    success_code: u16,
    client: Client,
}

impl HttpProbe {
    /// `port`, when given, overrides whatever port the URL carries.
    pub fn new(
        name: &str,
        url: &str,
        port: Option<u16>,
        method: Method,
        success_code: u16,
    ) -> anyhow::Result<Self> {
        let mut url = Url::parse(url)?;
        if let Some(port) = port {
            url.set_port(Some(port))
                .map_err(|_| anyhow::anyhow!("cannot set port on url {url}"))?;
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            name: name.to_string(),
            url,
            method,
            success_code,
            client,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeStatus {
        let request = self.client.request(self.method.clone(), self.url.clone());
        match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let text = response
                    .text()
                    .await
                    .map(|body| truncate(body.trim(), MAX_RESPONSE_TEXT))
                    .unwrap_or_default();
                ProbeStatus {
                    ok: code == self.success_code,
                    code: code as i32,
                    text,
                }
            }
            Err(e) => {
                debug!(probe = %self.name, error = %e, "transport failure");
                ProbeStatus::transport_failure()
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
