//! # Webhook Gateway
//!
//! The remote side of reconciliation: checks whether a webhook configuration
//! exists and writes a CA bundle into it.
//!
//! [`WebhookGateway`] is the seam the reconciler depends on;
//! [`KubeWebhookGateway`] implements it against the Kubernetes API
//! (`admissionregistration.k8s.io/v1` `ValidatingWebhookConfiguration`).

use crate::error::GatewayError;
use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::ValidatingWebhookConfiguration;
use k8s_openapi::ByteString;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use tracing::{debug, warn};

/// Remote webhook configuration store
///
/// Implementations must report a missing configuration as
/// [`GatewayError::NotFound`] so callers can tell a permanent failure from a
/// transient one.
#[async_trait]
pub trait WebhookGateway: Send + Sync {
    /// Whether the named webhook configuration currently exists
    ///
    /// Only a confirmed absence returns `false`; a lookup that fails for any
    /// other reason reports the configuration as present.
    async fn exists(&self, name: &str) -> bool;

    /// Write `bundle` as the `caBundle` of the named webhook configuration
    async fn apply_ca_bundle(&self, name: &str, bundle: &[u8]) -> Result<(), GatewayError>;
}

/// Kubernetes-backed [`WebhookGateway`]
#[derive(Clone)]
pub struct KubeWebhookGateway {
    api: Api<ValidatingWebhookConfiguration>,
}

impl std::fmt::Debug for KubeWebhookGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWebhookGateway").finish_non_exhaustive()
    }
}

impl KubeWebhookGateway {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl WebhookGateway for KubeWebhookGateway {
    async fn exists(&self, name: &str) -> bool {
        match self.api.get_opt(name).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(
                    webhook = name,
                    error = %e,
                    "Could not determine whether webhook configuration exists; assuming it does"
                );
                true
            }
        }
    }

    async fn apply_ca_bundle(&self, name: &str, bundle: &[u8]) -> Result<(), GatewayError> {
        let current = self
            .api
            .get(name)
            .await
            .map_err(|e| classify_kube_error(name, e))?;

        let patch = ca_bundle_patch(name, &current, bundle)?;

        self.api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify_kube_error(name, e))?;

        debug!(webhook = name, bytes = bundle.len(), "Patched caBundle");
        Ok(())
    }
}

fn classify_kube_error(name: &str, error: kube::Error) -> GatewayError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 404 => GatewayError::NotFound {
            name: name.to_string(),
        },
        source => GatewayError::Kube {
            name: name.to_string(),
            source,
        },
    }
}

/// Build a JSON merge patch that sets `caBundle` on every webhook entry
///
/// Merge patches replace lists wholesale, so the full observed `webhooks` list
/// is sent back with only `clientConfig.caBundle` changed. The observed
/// `resourceVersion` makes the API server reject the patch if the object
/// changed in between.
pub fn ca_bundle_patch(
    name: &str,
    current: &ValidatingWebhookConfiguration,
    bundle: &[u8],
) -> Result<serde_json::Value, GatewayError> {
    let mut webhooks = current.webhooks.clone().unwrap_or_default();
    if webhooks.is_empty() {
        return Err(GatewayError::NoWebhooks {
            name: name.to_string(),
        });
    }

    for webhook in &mut webhooks {
        webhook.client_config.ca_bundle = Some(ByteString(bundle.to_vec()));
    }

    let mut patch = json!({ "webhooks": serde_json::to_value(&webhooks)? });
    if let Some(resource_version) = &current.metadata.resource_version {
        patch["metadata"] = json!({ "resourceVersion": resource_version });
    }
    Ok(patch)
}
