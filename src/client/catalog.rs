use crate::client::core::Client;
use crate::client::endpoint::Endpoint;
use crate::client::policy::RetryPolicy;
use crate::decode::{decode_catalog, decode_environments, decode_health};
use crate::types::{CatalogEntry, HealthStatus};
use crate::Result;

impl Client {
    /// Probe `GET /health`. One attempt with the short health timeout; never retried.
    pub async fn health(&self) -> Result<HealthStatus> {
        let timeout = Some(self.inner.health_timeout);
        let resp = self
            .execute_with(Endpoint::Health, None, timeout, &RetryPolicy::no_retry())
            .await?;
        decode_health(&resp.body)
    }

    /// Knowledge environments the credential may query, in server order.
    pub async fn get_environments(&self) -> Result<Vec<String>> {
        let resp = self.execute(Endpoint::GetEnv, None).await?;
        decode_environments(&resp.body)
    }

    /// Prompt templates, in server order.
    pub async fn get_prompts(&self) -> Result<Vec<CatalogEntry>> {
        let resp = self.execute(Endpoint::GetPrompts, None).await?;
        decode_catalog(&resp.body, "prompts")
    }

    /// Response styles, in server order.
    pub async fn get_styles(&self) -> Result<Vec<CatalogEntry>> {
        let resp = self.execute(Endpoint::GetStyles, None).await?;
        decode_catalog(&resp.body, "styles")
    }
}
