//! Folding discovered deployments into an endpoint's model list.

use std::collections::HashSet;

use modelhub_core::{deployment_key, new_id, FetchedModel, Model};

/// Result of [`merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Existing models in their original order, followed by the new ones
    pub models: Vec<Model>,

    /// How many fetched entries were appended
    pub added: usize,
}

/// Union `fetched` into `existing` by case-insensitive deployment name.
///
/// Existing records are never modified, whatever the fetched entry says.
/// New entries are appended disabled and flagged as discovered. Fetched
/// entries without a deployment name are skipped, and a name that appears
/// twice in `fetched` is only added once, so running the merge again with
/// the same input adds nothing.
pub fn merge(existing: &[Model], fetched: &[FetchedModel]) -> MergeResult {
    let mut seen: HashSet<String> = existing.iter().map(Model::deployment_key).collect();
    let mut models = existing.to_vec();
    let mut added = 0;

    for entry in fetched {
        let deployment_name = entry.deployment_name.trim();
        if deployment_name.is_empty() {
            tracing::debug!("skipping discovered model without a deployment name");
            continue;
        }

        if !seen.insert(deployment_key(deployment_name)) {
            continue;
        }

        models.push(Model {
            id: new_id(),
            deployment_name: deployment_name.to_string(),
            model_name: entry
                .model_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            display_name: deployment_name.to_string(),
            description: String::new(),
            enabled: false,
            is_discovered: true,
        });
        added += 1;
    }

    MergeResult { models, added }
}
