//! Extra query arguments appended to the region server API URL.
//!
//! The strategy is picked by name from a fixed set. An unknown name, or a
//! strategy that fails at runtime, never blocks discovery: the request is
//! simply sent without extra arguments.

use super::{HttpRequest, HttpTransport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::warn;

const INSTANCE_METADATA: &str = "http://169.254.169.254";

/// Names accepted in `instance.instance_args`.
pub const KNOWN_STRATEGIES: [&str; 4] = ["none", "amazon", "google", "azure"];

#[async_trait]
pub trait InstanceArgs: Send + Sync {
    fn name(&self) -> &'static str;

    /// Query string (without leading `?`) to append to the API path.
    async fn produce_extra_query_args(&self, transport: &dyn HttpTransport) -> Result<String>;
}

/// Resolve a configured strategy name. `none`, empty and unknown names yield
/// `None`; unknown names are logged.
pub fn strategy_by_name(name: &str) -> Option<Box<dyn InstanceArgs>> {
    match name.trim() {
        "" | "none" => None,
        "amazon" => Some(Box::new(AmazonRegionHint)),
        "google" => Some(Box::new(GoogleRegionHint)),
        "azure" => Some(Box::new(AzureRegionHint)),
        other => {
            warn!(
                "Configured instanceArgs strategy '{}' is unknown (expected one of {}). \
                 Continuing without additional arguments.",
                other,
                KNOWN_STRATEGIES.join(", ")
            );
            None
        }
    }
}

/// EC2: availability zone `us-east-1a` becomes `regionHint=us-east-1`.
pub struct AmazonRegionHint;

/// GCE: zone `projects/1/zones/us-central1-f` becomes `regionHint=us-central1`.
pub struct GoogleRegionHint;

/// Azure: location `westeurope` becomes `regionHint=westeurope`.
pub struct AzureRegionHint;

#[async_trait]
impl InstanceArgs for AmazonRegionHint {
    fn name(&self) -> &'static str {
        "amazon"
    }

    async fn produce_extra_query_args(&self, transport: &dyn HttpTransport) -> Result<String> {
        let zone = fetch_text(
            transport,
            HttpRequest::get(format!(
                "{}/latest/meta-data/placement/availability-zone",
                INSTANCE_METADATA
            )),
        )
        .await?;
        region_hint(amazon_region(&zone))
    }
}

#[async_trait]
impl InstanceArgs for GoogleRegionHint {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn produce_extra_query_args(&self, transport: &dyn HttpTransport) -> Result<String> {
        let zone = fetch_text(
            transport,
            HttpRequest::get(format!(
                "{}/computeMetadata/v1/instance/zone",
                INSTANCE_METADATA
            ))
            .header("Metadata-Flavor", "Google"),
        )
        .await?;
        region_hint(google_region(&zone))
    }
}

#[async_trait]
impl InstanceArgs for AzureRegionHint {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn produce_extra_query_args(&self, transport: &dyn HttpTransport) -> Result<String> {
        let location = fetch_text(
            transport,
            HttpRequest::get(format!(
                "{}/metadata/instance/compute/location?api-version=2017-08-01&format=text",
                INSTANCE_METADATA
            ))
            .header("Metadata", "true"),
        )
        .await?;
        region_hint(location.trim())
    }
}

async fn fetch_text(transport: &dyn HttpTransport, request: HttpRequest) -> Result<String> {
    let response = transport.get(&request).await?;
    if !response.is_success() {
        return Err(Error::Discovery(format!(
            "instance metadata {} returned {}",
            request.url, response.status
        )));
    }
    Ok(response.body)
}

fn region_hint(region: &str) -> Result<String> {
    if region.is_empty() {
        return Err(Error::Discovery("instance metadata returned no region".to_string()));
    }
    Ok(format!("regionHint={}", region))
}

fn amazon_region(zone: &str) -> &str {
    zone.trim().trim_end_matches(|c: char| c.is_ascii_alphabetic())
}

fn google_region(zone: &str) -> &str {
    let zone = zone.trim().rsplit('/').next().unwrap_or_default();
    zone.rsplit_once('-').map(|(region, _)| region).unwrap_or(zone)
}
