// src/report/relay.rs
// =============================================================================
// Sends the HTML report through an e-mail relay service.
//
// The relay speaks the EmailJS REST API: one POST to
// {endpoint}/api/v1.0/email/send with a JSON body naming the service, the
// template and the template parameters. Any service accepting the same body
// works.
// =============================================================================

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

use super::format::format_html;
use crate::checker::CheckResult;

const SEND_PATH: &str = "api/v1.0/email/send";
const DEFAULT_ENDPOINT: &str = "https://api.emailjs.com/";
const SUBJECT: &str = "Website monitoring report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRelayConfig {
    /// Base URL of the relay service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    /// Public key of the relay account
    pub user_id: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("there are no results to send")]
    NoResults,
    #[error("invalid relay endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay rejected the report: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Serialize)]
struct TemplateParams<'a> {
    to_email: &'a str,
    subject: &'a str,
    message: String,
}

#[derive(Debug, Clone)]
pub struct MailRelay {
    client: Client,
    url: Url,
    config: MailRelayConfig,
}

impl MailRelay {
    pub fn new(config: MailRelayConfig) -> Result<Self, RelayError> {
        let url = Url::parse(&config.endpoint)
            .and_then(|base| base.join(SEND_PATH))
            .map_err(|source| RelayError::Endpoint {
                endpoint: config.endpoint.clone(),
                source,
            })?;

        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self { client, url, config })
    }

    // Sends the results as an HTML report to `recipient`
    pub async fn send_report(&self, recipient: &str, results: &[CheckResult]) -> Result<(), RelayError> {
        if results.is_empty() {
            return Err(RelayError::NoResults);
        }

        let request = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.user_id,
            template_params: TemplateParams {
                to_email: recipient,
                subject: SUBJECT,
                message: format_html(results),
            },
        };

        let response = self.client.post(self.url.clone()).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(recipient, count = results.len(), "report sent");
        Ok(())
    }
}
