//! Tag reconciliation.

use tracing::debug;

use crate::cloud::types::{normalize_tags, ResourceKind};
use crate::error::Result;

use super::NetworkingService;

impl NetworkingService<'_> {
    /// Replace the full tag set on a taggable resource and return the
    /// tags now on it.
    ///
    /// Empty desired input is a no-op, and so is a resource whose
    /// current tags already equal the desired set, so a converged
    /// reconcile makes no remote call here. Tags are deduplicated and
    /// sorted before the call so repeated runs produce identical
    /// requests. The taggable kinds are exactly the [`ResourceKind`]
    /// variants, so an unknown kind cannot be expressed.
    pub async fn reconcile_tags(
        &self,
        kind: ResourceKind,
        resource_id: &str,
        desired: &[String],
        current: &[String],
    ) -> Result<Vec<String>> {
        if desired.is_empty() {
            debug!(kind = %kind, id = %resource_id, "no tags requested, skipping");
            return Ok(current.to_vec());
        }
        let normalized = normalize_tags(desired);
        if normalize_tags(current) == normalized {
            debug!(kind = %kind, id = %resource_id, "tags already match");
            return Ok(normalized);
        }
        self.api.replace_tags(kind, resource_id, &normalized).await?;
        Ok(normalized)
    }
}
