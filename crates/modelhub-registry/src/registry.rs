//! The endpoint registry aggregate and its builder.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use modelhub_core::{
    new_id, DefaultModelSelection, Endpoint, FetchedModel, HubError, Model, Result,
    SelectableOption, SelectionWarning, ValidationError,
};
use modelhub_telemetry::MetricsRecorder;

use crate::discovery;
use crate::gate::{Clock, DeleteOutcome, DeletionGate, SystemClock, DEFAULT_CONFIRM_WINDOW};
use crate::resolver;
use crate::store::RegistrySnapshot;
use crate::validation;

/// Something a delete request can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    Endpoint(String),
    Model { endpoint_id: String, model_id: String },
}

/// Value returned by a registry operation, plus the warning raised if the
/// operation invalidated the default selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<SelectionWarning>,
}

impl<T> Outcome<T> {
    fn new(value: T, warning: Option<SelectionWarning>) -> Self {
        Self { value, warning }
    }
}

/// The in-memory working copy of all endpoints and the default selection.
///
/// Every mutating call validates its input first, then changes state, then
/// reconciles the default selection so it never points at a disabled or
/// deleted model between calls. Nothing here touches disk; use
/// [`EndpointRegistry::snapshot`] and a `RegistryStore` to persist.
pub struct EndpointRegistry {
    /// Endpoints in operator-defined order.
    endpoints: Vec<Endpoint>,

    /// Platform-wide default, always either empty or selectable.
    default_model: DefaultModelSelection,

    /// Guards endpoint and model deletes behind a second request.
    gate: DeletionGate<DeletionTarget>,

    /// Optional shared metrics recorder.
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry {
    /// Create an empty registry using the wall clock and the default
    /// confirmation window.
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            default_model: DefaultModelSelection::empty(),
            gate: DeletionGate::new(Arc::new(SystemClock), DEFAULT_CONFIRM_WINDOW),
            metrics: None,
        }
    }

    /// Return the number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// All endpoints in order.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Get an endpoint by id.
    pub fn get(&self, id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// The current default selection.
    pub fn default_model(&self) -> &DefaultModelSelection {
        &self.default_model
    }

    /// Every model as a default candidate.
    pub fn selectable_options(&self) -> Vec<SelectableOption> {
        resolver::compute_selectable_options(&self.endpoints)
    }

    /// The delete request currently awaiting confirmation, if any.
    pub fn pending_deletion(&self) -> Option<&DeletionTarget> {
        self.gate.armed_target()
    }

    /// Serializable copy of the registry for the persistence layer.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            endpoints: self.endpoints.clone(),
            default_model: self.default_model.clone(),
        }
    }

    /// Validate and insert or replace an endpoint.
    ///
    /// A payload whose id matches an existing endpoint replaces it in place.
    /// Any other payload is appended as a new, enabled endpoint under a
    /// freshly generated id.
    pub fn upsert_endpoint(&mut self, payload: Endpoint) -> Result<Outcome<Endpoint>> {
        const OP: &str = "upsert_endpoint";

        let mut endpoint = match validation::validate(&payload) {
            Ok(endpoint) => endpoint,
            Err(err) => return Err(self.reject(OP, err)),
        };

        let stored = self
            .position(&endpoint.id)
            .map(|idx| self.endpoints[idx].models.as_slice())
            .unwrap_or_default();
        endpoint.models = match normalize_models(&endpoint.models, stored) {
            Ok(models) => models,
            Err(err) => return Err(self.reject(OP, err)),
        };

        match self.position(&endpoint.id) {
            Some(idx) => {
                tracing::info!(endpoint = %endpoint.name, id = %endpoint.id, "updated endpoint");
                self.endpoints[idx] = endpoint.clone();
            }
            None => {
                endpoint.id = new_id();
                endpoint.enabled = true;
                tracing::info!(endpoint = %endpoint.name, id = %endpoint.id, "added endpoint");
                self.endpoints.push(endpoint.clone());
            }
        }

        Ok(self.commit(OP, endpoint))
    }

    /// Request deletion of an endpoint.
    ///
    /// The first call arms the confirmation gate; a second call for the same
    /// endpoint within the window removes it.
    pub fn delete_endpoint(&mut self, id: &str) -> Result<Outcome<DeleteOutcome>> {
        const OP: &str = "delete_endpoint";

        let Some(idx) = self.position(id) else {
            self.record(OP, false);
            return Err(HubError::EndpointNotFound(id.to_string()));
        };

        let outcome = self.gate.request(DeletionTarget::Endpoint(id.to_string()));
        if outcome == DeleteOutcome::Deleted {
            let removed = self.endpoints.remove(idx);
            tracing::info!(endpoint = %removed.name, id = %removed.id, "deleted endpoint");
        }

        Ok(self.commit(OP, outcome))
    }

    /// Flip an endpoint's `enabled` flag and return the new value.
    pub fn toggle_endpoint(&mut self, id: &str) -> Result<Outcome<bool>> {
        const OP: &str = "toggle_endpoint";

        let Some(idx) = self.position(id) else {
            self.record(OP, false);
            return Err(HubError::EndpointNotFound(id.to_string()));
        };

        let endpoint = &mut self.endpoints[idx];
        endpoint.enabled = !endpoint.enabled;
        let enabled = endpoint.enabled;
        tracing::info!(endpoint = %endpoint.name, enabled, "toggled endpoint");

        Ok(self.commit(OP, enabled))
    }

    /// Validate and insert or replace a model on one endpoint.
    ///
    /// Deployment names are unique per endpoint (case-insensitive). A model
    /// that arrived through discovery keeps its deployment name and its
    /// provenance flag.
    pub fn upsert_model(&mut self, endpoint_id: &str, payload: Model) -> Result<Outcome<Model>> {
        const OP: &str = "upsert_model";

        let Some(idx) = self.position(endpoint_id) else {
            self.record(OP, false);
            return Err(HubError::EndpointNotFound(endpoint_id.to_string()));
        };

        let mut model = match validation::validate_model(&payload) {
            Ok(model) => model,
            Err(err) => return Err(self.reject(OP, err)),
        };

        let existing = self.endpoints[idx]
            .models
            .iter()
            .position(|m| !model.id.is_empty() && m.id == model.id);

        if let Err(err) = check_model_edit(&self.endpoints[idx], existing, &model) {
            return Err(self.reject(OP, err));
        }

        let endpoint = &mut self.endpoints[idx];
        match existing {
            Some(pos) => {
                model.is_discovered = endpoint.models[pos].is_discovered;
                endpoint.models[pos] = model.clone();
                tracing::info!(endpoint = %endpoint.name, deployment = %model.deployment_name, "updated model");
            }
            None => {
                model.id = new_id();
                model.is_discovered = false;
                endpoint.models.push(model.clone());
                tracing::info!(endpoint = %endpoint.name, deployment = %model.deployment_name, "added model");
            }
        }

        Ok(self.commit(OP, model))
    }

    /// Request deletion of a model; confirmed like [`Self::delete_endpoint`].
    pub fn delete_model(
        &mut self,
        endpoint_id: &str,
        model_id: &str,
    ) -> Result<Outcome<DeleteOutcome>> {
        const OP: &str = "delete_model";

        let (idx, pos) = match self.model_position(endpoint_id, model_id) {
            Ok(found) => found,
            Err(err) => {
                self.record(OP, false);
                return Err(err);
            }
        };

        let outcome = self.gate.request(DeletionTarget::Model {
            endpoint_id: endpoint_id.to_string(),
            model_id: model_id.to_string(),
        });
        if outcome == DeleteOutcome::Deleted {
            let endpoint = &mut self.endpoints[idx];
            let removed = endpoint.models.remove(pos);
            tracing::info!(endpoint = %endpoint.name, deployment = %removed.deployment_name, "deleted model");
        }

        Ok(self.commit(OP, outcome))
    }

    /// Flip a model's `enabled` flag and return the new value.
    pub fn toggle_model(&mut self, endpoint_id: &str, model_id: &str) -> Result<Outcome<bool>> {
        const OP: &str = "toggle_model";

        let (idx, pos) = match self.model_position(endpoint_id, model_id) {
            Ok(found) => found,
            Err(err) => {
                self.record(OP, false);
                return Err(err);
            }
        };

        let model = &mut self.endpoints[idx].models[pos];
        model.enabled = !model.enabled;
        let enabled = model.enabled;
        tracing::info!(deployment = %model.deployment_name, enabled, "toggled model");

        Ok(self.commit(OP, enabled))
    }

    /// Fold a successful discovery result into one endpoint's models and
    /// return how many were added.
    ///
    /// Failed fetches never reach this call, so a transport error leaves the
    /// registry untouched.
    pub fn merge_discovered(
        &mut self,
        endpoint_id: &str,
        fetched: &[FetchedModel],
    ) -> Result<Outcome<usize>> {
        const OP: &str = "merge_discovered";

        let Some(idx) = self.position(endpoint_id) else {
            self.record(OP, false);
            return Err(HubError::EndpointNotFound(endpoint_id.to_string()));
        };

        let endpoint = &mut self.endpoints[idx];
        let merged = discovery::merge(&endpoint.models, fetched);
        endpoint.models = merged.models;
        tracing::debug!(
            endpoint = %endpoint.name,
            fetched = fetched.len(),
            added = merged.added,
            "merged discovered models"
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_discovery(endpoint_id, merged.added);
        }

        Ok(self.commit(OP, merged.added))
    }

    /// Make an enabled model on an enabled endpoint the default.
    pub fn set_default(&mut self, endpoint_id: &str, model_id: &str) -> Result<DefaultModelSelection> {
        const OP: &str = "set_default";

        let (idx, pos) = match self.model_position(endpoint_id, model_id) {
            Ok(found) => found,
            Err(err) => {
                self.record(OP, false);
                return Err(err);
            }
        };

        let endpoint = &self.endpoints[idx];
        let model = &endpoint.models[pos];
        if !(endpoint.enabled && model.enabled) {
            self.record(OP, false);
            return Err(HubError::NotSelectable {
                endpoint: endpoint_id.to_string(),
                model: model_id.to_string(),
            });
        }

        self.default_model = DefaultModelSelection::new(endpoint, model);
        tracing::info!(endpoint = %endpoint.name, deployment = %model.deployment_name, "default model set");
        self.record(OP, true);

        Ok(self.default_model.clone())
    }

    /// Reset the default to the empty selection.
    pub fn clear_default(&mut self) {
        if !self.default_model.is_empty() {
            tracing::info!("default model cleared");
        }
        self.default_model = DefaultModelSelection::empty();
        self.record("clear_default", true);
    }

    /// Re-check the default against the current endpoints, clearing it if it
    /// no longer points at a selectable model.
    pub fn reconcile_default(&mut self) -> Option<SelectionWarning> {
        let (validated, warning) = resolver::reconcile(&self.endpoints, &self.default_model);
        self.default_model = validated;

        if let Some(warning) = &warning {
            tracing::warn!(
                endpoint_id = %warning.previous.endpoint_id,
                model_id = %warning.previous.model_id,
                "{}",
                warning
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_default_cleared();
            }
        }

        warning
    }

    fn position(&self, id: &str) -> Option<usize> {
        if id.is_empty() {
            return None;
        }
        self.endpoints.iter().position(|e| e.id == id)
    }

    fn model_position(&self, endpoint_id: &str, model_id: &str) -> Result<(usize, usize)> {
        let idx = self
            .position(endpoint_id)
            .ok_or_else(|| HubError::EndpointNotFound(endpoint_id.to_string()))?;
        let pos = self.endpoints[idx]
            .models
            .iter()
            .position(|m| m.id == model_id)
            .ok_or_else(|| HubError::model_not_found(endpoint_id, model_id))?;
        Ok((idx, pos))
    }

    /// Reconcile the default after a successful mutation and wrap the result.
    fn commit<T>(&mut self, operation: &str, value: T) -> Outcome<T> {
        let warning = self.reconcile_default();
        self.record(operation, true);
        Outcome::new(value, warning)
    }

    fn reject(&self, operation: &str, err: ValidationError) -> HubError {
        tracing::warn!(operation, field = err.field(), "rejected payload: {}", err);
        if let Some(metrics) = &self.metrics {
            metrics.record_validation_failure(err.field());
        }
        self.record(operation, false);
        err.into()
    }

    fn record(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_mutation(operation, success);
        }
    }
}

/// Validate every model of an endpoint payload, giving fresh ids to models
/// without one (or with an id already used earlier in the list).
///
/// `stored` holds the models of the endpoint being replaced. A payload model
/// whose id matches a stored discovered model keeps its deployment name and
/// its provenance flag.
fn normalize_models(
    models: &[Model],
    stored: &[Model],
) -> std::result::Result<Vec<Model>, ValidationError> {
    let mut ids = HashSet::new();
    let mut deployments = HashSet::new();
    let mut normalized = Vec::with_capacity(models.len());

    for model in models {
        let mut model = validation::validate_model(model)?;
        let previous = stored
            .iter()
            .find(|m| !model.id.is_empty() && m.id == model.id);
        if let Some(current) = previous.filter(|m| m.is_discovered) {
            if current.deployment_key() != model.deployment_key() {
                return Err(ValidationError::DeploymentNameLocked {
                    current: current.deployment_name.clone(),
                });
            }
            model.is_discovered = true;
        }
        if !deployments.insert(model.deployment_key()) {
            return Err(ValidationError::DuplicateDeployment(model.deployment_name));
        }
        if model.id.is_empty() || !ids.insert(model.id.clone()) {
            model.id = new_id();
            ids.insert(model.id.clone());
        }
        normalized.push(model);
    }

    Ok(normalized)
}

/// Rules for replacing the model at `existing` (or adding a new one) on
/// `endpoint`.
fn check_model_edit(
    endpoint: &Endpoint,
    existing: Option<usize>,
    model: &Model,
) -> std::result::Result<(), ValidationError> {
    if let Some(pos) = existing {
        let current = &endpoint.models[pos];
        if current.is_discovered && current.deployment_key() != model.deployment_key() {
            return Err(ValidationError::DeploymentNameLocked {
                current: current.deployment_name.clone(),
            });
        }
    }

    let key = model.deployment_key();
    let clash = endpoint
        .models
        .iter()
        .enumerate()
        .any(|(pos, m)| Some(pos) != existing && m.deployment_key() == key);
    if clash {
        return Err(ValidationError::DuplicateDeployment(model.deployment_name.clone()));
    }

    Ok(())
}

/// Builder for an [`EndpointRegistry`] seeded from a persisted snapshot and
/// wired with a clock, confirmation window and metrics.
pub struct EndpointRegistryBuilder {
    snapshot: RegistrySnapshot,
    clock: Arc<dyn Clock>,
    confirm_window: Duration,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl Default for EndpointRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistryBuilder {
    /// Start building an empty registry.
    pub fn new() -> Self {
        Self {
            snapshot: RegistrySnapshot::default(),
            clock: Arc::new(SystemClock),
            confirm_window: DEFAULT_CONFIRM_WINDOW,
            metrics: None,
        }
    }

    /// Seed the working copy from the last persisted state.
    pub fn with_snapshot(mut self, snapshot: RegistrySnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Use a custom clock for the deletion gate.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override how long a delete stays armed.
    pub fn with_confirm_window(mut self, window: Duration) -> Self {
        self.confirm_window = window;
        self
    }

    /// Attach a shared `MetricsRecorder`.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the registry.
    ///
    /// Snapshot endpoints must have unique, non-empty ids. Models without an
    /// id get one. The stored default is reconciled immediately; the warning,
    /// if any, is returned alongside the registry.
    pub fn build(self) -> Result<Outcome<EndpointRegistry>> {
        let mut seen = HashSet::new();
        let mut endpoints = Vec::with_capacity(self.snapshot.endpoints.len());

        for mut endpoint in self.snapshot.endpoints {
            if endpoint.id.trim().is_empty() {
                return Err(HubError::storage(format!(
                    "endpoint '{}' in snapshot has no id",
                    endpoint.name
                )));
            }
            if !seen.insert(endpoint.id.clone()) {
                return Err(HubError::storage(format!(
                    "duplicate endpoint id in snapshot: {}",
                    endpoint.id
                )));
            }

            let mut model_ids = HashSet::new();
            for model in &mut endpoint.models {
                if model.id.is_empty() || !model_ids.insert(model.id.clone()) {
                    model.id = new_id();
                    model_ids.insert(model.id.clone());
                }
            }
            endpoints.push(endpoint);
        }

        let mut registry = EndpointRegistry {
            endpoints,
            default_model: self.snapshot.default_model,
            gate: DeletionGate::new(self.clock, self.confirm_window),
            metrics: self.metrics,
        };
        let warning = registry.reconcile_default();

        Ok(Outcome::new(registry, warning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ManualClock;
    use modelhub_core::{Auth, Connection, Provider};
    use modelhub_telemetry::CountingMetricsRecorder;

    fn azure_payload(name: &str) -> Endpoint {
        Endpoint::new(
            name,
            Provider::AzureOpenAI,
            Connection::new("https://prod.openai.azure.com", "2024-10-21"),
            Auth::api_key("key"),
        )
    }

    fn foundry_payload(name: &str) -> Endpoint {
        Endpoint::new(
            name,
            Provider::AiFoundry,
            Connection {
                endpoint: "https://lab.services.ai.azure.com/api/projects/lab".to_string(),
                openai_api_version: "2024-10-21".to_string(),
                project_api_version: "2025-05-01".to_string(),
                project_name: String::new(),
            },
            Auth::managed_identity(),
        )
    }

    fn registry_with_clock() -> (Arc<ManualClock>, EndpointRegistry) {
        let clock = Arc::new(ManualClock::default());
        let registry = EndpointRegistryBuilder::new()
            .with_clock(clock.clone())
            .build()
            .expect("build registry")
            .value;
        (clock, registry)
    }

    /// Registry holding one API-key Azure endpoint with `gpt-4o` as default.
    fn registry_with_default() -> (EndpointRegistry, String, String) {
        let (_clock, mut registry) = registry_with_clock();
        let endpoint = registry
            .upsert_endpoint(azure_payload("prod"))
            .unwrap()
            .value;
        let model = registry
            .upsert_model(&endpoint.id, Model::new("gpt-4o"))
            .unwrap()
            .value;
        registry.set_default(&endpoint.id, &model.id).unwrap();
        (registry, endpoint.id, model.id)
    }

    fn assert_default_valid(registry: &EndpointRegistry) {
        let selection = registry.default_model();
        if selection.is_empty() {
            return;
        }
        let endpoint = registry
            .get(&selection.endpoint_id)
            .expect("default endpoint exists");
        let model = endpoint
            .model(&selection.model_id)
            .expect("default model exists");
        assert!(endpoint.enabled && model.enabled);
    }

    #[test]
    fn upsert_appends_with_generated_id() {
        let mut registry = EndpointRegistry::new();

        let mut payload = azure_payload("prod");
        payload.enabled = false;
        payload.id = "client-chosen".to_string();
        let outcome = registry.upsert_endpoint(payload).unwrap();

        assert!(outcome.warning.is_none());
        assert_ne!(outcome.value.id, "client-chosen");
        assert!(outcome.value.enabled);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut registry = EndpointRegistry::new();
        let first = registry.upsert_endpoint(azure_payload("a")).unwrap().value;
        let second = registry.upsert_endpoint(foundry_payload("b")).unwrap().value;

        let mut edit = first.clone();
        edit.name = "a-renamed".to_string();
        registry.upsert_endpoint(edit).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.endpoints()[0].id, first.id);
        assert_eq!(registry.endpoints()[0].name, "a-renamed");
        assert_eq!(registry.endpoints()[1].id, second.id);
    }

    #[test]
    fn upsert_rejects_invalid_payload() {
        let metrics = Arc::new(CountingMetricsRecorder::new());
        let mut registry = EndpointRegistryBuilder::new()
            .with_metrics(metrics.clone())
            .build()
            .unwrap()
            .value;

        let err = registry
            .upsert_endpoint(azure_payload(""))
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::MissingField { field: "name" })
        ));
        assert!(registry.is_empty());

        let snap = metrics.snapshot();
        assert_eq!(snap.validation_failures, 1);
        assert_eq!(snap.mutations_failed, 1);
    }

    #[test]
    fn upsert_assigns_missing_and_duplicate_model_ids() {
        let mut registry = EndpointRegistry::new();
        let payload = azure_payload("prod")
            .with_model(Model::new("gpt-4o").with_id("dup"))
            .with_model(Model::new("o3-mini").with_id("dup"))
            .with_model(Model::new("gpt-4.1"));

        let endpoint = registry.upsert_endpoint(payload).unwrap().value;

        let ids: HashSet<_> = endpoint.models.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn upsert_rejects_duplicate_deployments_in_payload() {
        let mut registry = EndpointRegistry::new();
        let payload = azure_payload("prod")
            .with_model(Model::new("gpt-4o"))
            .with_model(Model::new("GPT-4o"));

        let err = registry.upsert_endpoint(payload).unwrap_err();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::DuplicateDeployment(_))
        ));
    }

    #[test]
    fn disabling_default_endpoint_clears_default() {
        let (mut registry, endpoint_id, _) = registry_with_default();
        assert!(!registry.default_model().is_empty());

        let outcome = registry.toggle_endpoint(&endpoint_id).unwrap();

        assert!(!outcome.value);
        let warning = outcome.warning.expect("stale default warning");
        assert_eq!(
            warning.to_string(),
            "the previous default is no longer available."
        );
        assert_eq!(registry.default_model(), &DefaultModelSelection::empty());
        assert!(registry.selectable_options().iter().all(|o| !o.is_selectable));
    }

    #[test]
    fn re_enabling_does_not_restore_default() {
        let (mut registry, endpoint_id, _) = registry_with_default();

        registry.toggle_endpoint(&endpoint_id).unwrap();
        let outcome = registry.toggle_endpoint(&endpoint_id).unwrap();

        assert!(outcome.value);
        assert!(outcome.warning.is_none());
        assert!(registry.default_model().is_empty());
    }

    #[test]
    fn disabling_default_model_clears_default() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();

        let outcome = registry.toggle_model(&endpoint_id, &model_id).unwrap();
        assert!(!outcome.value);
        assert!(outcome.warning.is_some());
        assert!(registry.default_model().is_empty());
    }

    #[test]
    fn delete_requires_confirmation() {
        let (mut registry, endpoint_id, _) = registry_with_default();

        let first = registry.delete_endpoint(&endpoint_id).unwrap();
        assert_eq!(first.value, DeleteOutcome::ConfirmAgain);
        assert!(first.warning.is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.pending_deletion(),
            Some(&DeletionTarget::Endpoint(endpoint_id.clone()))
        );

        let second = registry.delete_endpoint(&endpoint_id).unwrap();
        assert_eq!(second.value, DeleteOutcome::Deleted);
        assert!(second.warning.is_some());
        assert!(registry.is_empty());
        assert!(registry.default_model().is_empty());
    }

    #[test]
    fn delete_of_other_endpoint_disarms_first() {
        let (_clock, mut registry) = registry_with_clock();
        let e1 = registry.upsert_endpoint(azure_payload("e1")).unwrap().value;
        let e2 = registry.upsert_endpoint(foundry_payload("e2")).unwrap().value;

        registry.delete_endpoint(&e1.id).unwrap();
        let outcome = registry.delete_endpoint(&e2.id).unwrap();

        assert_eq!(outcome.value, DeleteOutcome::ConfirmAgain);
        assert_eq!(registry.len(), 2);

        // e1 was disarmed, so this only re-arms it.
        let outcome = registry.delete_endpoint(&e1.id).unwrap();
        assert_eq!(outcome.value, DeleteOutcome::ConfirmAgain);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn delete_confirmation_expires() {
        let (clock, mut registry) = registry_with_clock();
        let e1 = registry.upsert_endpoint(azure_payload("e1")).unwrap().value;

        registry.delete_endpoint(&e1.id).unwrap();
        clock.advance(Duration::from_secs(6));
        let outcome = registry.delete_endpoint(&e1.id).unwrap();

        assert_eq!(outcome.value, DeleteOutcome::ConfirmAgain);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn delete_unknown_endpoint_errors() {
        let mut registry = EndpointRegistry::new();
        let err = registry.delete_endpoint("missing").unwrap_err();
        assert!(matches!(err, HubError::EndpointNotFound(_)));
        assert!(registry.pending_deletion().is_none());
    }

    #[test]
    fn delete_default_model_clears_default() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();

        registry.delete_model(&endpoint_id, &model_id).unwrap();
        let outcome = registry.delete_model(&endpoint_id, &model_id).unwrap();

        assert_eq!(outcome.value, DeleteOutcome::Deleted);
        assert!(outcome.warning.is_some());
        assert_eq!(registry.get(&endpoint_id).unwrap().model_count(), 0);
    }

    #[test]
    fn model_and_endpoint_deletes_share_one_gate() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();

        registry.delete_model(&endpoint_id, &model_id).unwrap();
        registry.delete_endpoint(&endpoint_id).unwrap();
        let outcome = registry.delete_model(&endpoint_id, &model_id).unwrap();

        assert_eq!(outcome.value, DeleteOutcome::ConfirmAgain);
        assert_eq!(registry.get(&endpoint_id).unwrap().model_count(), 1);
    }

    #[test]
    fn upsert_model_updates_by_id() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();

        let edit = Model::new("gpt-4o")
            .with_id(model_id.clone())
            .with_display_name("Prod GPT-4o");
        let outcome = registry.upsert_model(&endpoint_id, edit).unwrap();

        assert_eq!(outcome.value.id, model_id);
        let endpoint = registry.get(&endpoint_id).unwrap();
        assert_eq!(endpoint.model_count(), 1);
        assert_eq!(endpoint.models[0].display_name, "Prod GPT-4o");
        assert!(!registry.default_model().is_empty());
    }

    #[test]
    fn upsert_model_rejects_duplicate_deployment() {
        let (mut registry, endpoint_id, _) = registry_with_default();

        let err = registry
            .upsert_model(&endpoint_id, Model::new("GPT-4O"))
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::DuplicateDeployment(_))
        ));
    }

    #[test]
    fn upsert_model_requires_deployment_name() {
        let (mut registry, endpoint_id, _) = registry_with_default();

        let err = registry
            .upsert_model(&endpoint_id, Model::new(""))
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: deployment name required");
    }

    #[test]
    fn discovered_deployment_name_is_locked() {
        let (mut registry, endpoint_id, _) = registry_with_default();
        registry
            .merge_discovered(&endpoint_id, &[FetchedModel::new("o3-mini")])
            .unwrap();
        let discovered = registry.get(&endpoint_id).unwrap().models[1].clone();
        assert!(discovered.is_discovered);

        let mut rename = discovered.clone();
        rename.deployment_name = "o3".to_string();
        let err = registry.upsert_model(&endpoint_id, rename).unwrap_err();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::DeploymentNameLocked { .. })
        ));

        // Other fields stay editable, and provenance cannot be dropped.
        let mut relabel = discovered.clone();
        relabel.display_name = "O3 Mini".to_string();
        relabel.enabled = true;
        relabel.is_discovered = false;
        let updated = registry.upsert_model(&endpoint_id, relabel).unwrap().value;
        assert!(updated.is_discovered);
        assert!(updated.enabled);
    }

    #[test]
    fn endpoint_upsert_keeps_discovered_identity() {
        let (mut registry, endpoint_id, _) = registry_with_default();
        registry
            .merge_discovered(&endpoint_id, &[FetchedModel::new("o3-mini")])
            .unwrap();

        let mut rename = registry.get(&endpoint_id).unwrap().clone();
        rename.models[1].deployment_name = "renamed".to_string();
        rename.models[1].is_discovered = false;
        let err = registry.upsert_endpoint(rename).unwrap_err();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::DeploymentNameLocked { .. })
        ));
        assert_eq!(
            registry.get(&endpoint_id).unwrap().models[1].deployment_name,
            "o3-mini"
        );

        let mut relabel = registry.get(&endpoint_id).unwrap().clone();
        relabel.models[1].display_name = "O3 Mini".to_string();
        relabel.models[1].is_discovered = false;
        let updated = registry.upsert_endpoint(relabel).unwrap().value;
        assert_eq!(updated.models[1].display_name, "O3 Mini");
        assert!(updated.models[1].is_discovered);
    }

    #[test]
    fn provider_change_refreshes_default() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();

        let mut edit = registry.get(&endpoint_id).unwrap().clone();
        edit.provider = Provider::AiFoundry;
        edit.connection.endpoint = "https://lab.services.ai.azure.com/api/projects/lab".to_string();
        edit.connection.project_api_version = "2025-05-01".to_string();
        let outcome = registry.upsert_endpoint(edit).unwrap();

        assert!(outcome.warning.is_none());
        assert_eq!(registry.default_model().model_id, model_id);
        assert_eq!(registry.default_model().provider, "aiFoundry");
    }

    #[test]
    fn builder_normalizes_leftover_provider_on_empty_default() {
        let snapshot = RegistrySnapshot {
            endpoints: vec![azure_payload("prod").with_id("e1")],
            default_model: DefaultModelSelection {
                endpoint_id: String::new(),
                model_id: String::new(),
                provider: "azureOpenAI".to_string(),
            },
        };

        let built = EndpointRegistryBuilder::new()
            .with_snapshot(snapshot)
            .build()
            .unwrap();

        assert!(built.warning.is_none());
        assert_eq!(built.value.default_model(), &DefaultModelSelection::empty());
        assert_eq!(
            built.value.snapshot().default_model,
            DefaultModelSelection::empty()
        );
    }

    #[test]
    fn merge_discovered_is_idempotent_and_keeps_edits() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();
        registry
            .upsert_model(
                &endpoint_id,
                Model::new("gpt-4o").with_id(model_id).with_display_name("Custom"),
            )
            .unwrap();

        let fetched = vec![FetchedModel::new("GPT-4O"), FetchedModel::new("o3-mini")];
        let first = registry.merge_discovered(&endpoint_id, &fetched).unwrap();
        let second = registry.merge_discovered(&endpoint_id, &fetched).unwrap();

        assert_eq!(first.value, 1);
        assert_eq!(second.value, 0);
        let endpoint = registry.get(&endpoint_id).unwrap();
        assert_eq!(endpoint.model_count(), 2);
        assert_eq!(endpoint.models[0].display_name, "Custom");
        assert!(!endpoint.models[1].enabled);
    }

    #[test]
    fn set_default_requires_selectable_model() {
        let (mut registry, endpoint_id, _) = registry_with_default();
        registry
            .merge_discovered(&endpoint_id, &[FetchedModel::new("o3-mini")])
            .unwrap();
        let disabled_id = registry.get(&endpoint_id).unwrap().models[1].id.clone();

        let err = registry.set_default(&endpoint_id, &disabled_id).unwrap_err();
        assert!(matches!(err, HubError::NotSelectable { .. }));

        let err = registry.set_default(&endpoint_id, "nope").unwrap_err();
        assert!(matches!(err, HubError::ModelNotFound { .. }));
    }

    #[test]
    fn set_and_clear_default() {
        let (mut registry, endpoint_id, model_id) = registry_with_default();
        assert_eq!(registry.default_model().endpoint_id, endpoint_id);
        assert_eq!(registry.default_model().model_id, model_id);
        assert_eq!(registry.default_model().provider, "azureOpenAI");

        registry.clear_default();
        assert_eq!(registry.default_model(), &DefaultModelSelection::empty());
    }

    #[test]
    fn selection_invariant_holds_across_mutations() {
        let (_clock, mut registry) = registry_with_clock();
        let e1 = registry.upsert_endpoint(azure_payload("e1")).unwrap().value;
        let e2 = registry.upsert_endpoint(foundry_payload("e2")).unwrap().value;
        let m1 = registry.upsert_model(&e1.id, Model::new("gpt-4o")).unwrap().value;
        let m2 = registry.upsert_model(&e1.id, Model::new("o3-mini")).unwrap().value;
        let m3 = registry.upsert_model(&e2.id, Model::new("phi-4")).unwrap().value;

        let targets = [
            (e1.id.clone(), m1.id.clone()),
            (e1.id.clone(), m2.id.clone()),
            (e2.id.clone(), m3.id.clone()),
        ];

        for round in 0..12 {
            let (endpoint_id, model_id) = &targets[round % targets.len()];
            let _ = registry.set_default(endpoint_id, model_id);
            assert_default_valid(&registry);

            match round % 4 {
                0 => {
                    let _ = registry.toggle_endpoint(endpoint_id);
                }
                1 => {
                    let _ = registry.toggle_model(endpoint_id, model_id);
                }
                2 => {
                    let _ = registry.delete_model(endpoint_id, model_id);
                    let _ = registry.delete_model(endpoint_id, model_id);
                }
                _ => {
                    let _ = registry.toggle_endpoint(endpoint_id);
                    let _ = registry.toggle_endpoint(endpoint_id);
                }
            }
            assert_default_valid(&registry);
        }

        let _ = registry.delete_endpoint(&e2.id);
        let _ = registry.delete_endpoint(&e2.id);
        assert_default_valid(&registry);
    }

    #[test]
    fn ids_stay_unique() {
        let mut registry = EndpointRegistry::new();
        for i in 0..5 {
            let endpoint = registry
                .upsert_endpoint(azure_payload(&format!("ep{}", i)))
                .unwrap()
                .value;
            for name in ["gpt-4o", "o3-mini"] {
                registry.upsert_model(&endpoint.id, Model::new(name)).unwrap();
            }
        }

        let endpoint_ids: HashSet<_> = registry.endpoints().iter().map(|e| &e.id).collect();
        assert_eq!(endpoint_ids.len(), 5);
        for endpoint in registry.endpoints() {
            let model_ids: HashSet<_> = endpoint.models.iter().map(|m| &m.id).collect();
            assert_eq!(model_ids.len(), endpoint.model_count());
        }
    }

    #[test]
    fn builder_reconciles_stale_snapshot_default() {
        let endpoint = azure_payload("prod")
            .with_id("e1")
            .with_model(Model::new("gpt-4o").with_id("m1").with_enabled(false));
        let snapshot = RegistrySnapshot {
            endpoints: vec![endpoint],
            default_model: DefaultModelSelection {
                endpoint_id: "e1".to_string(),
                model_id: "m1".to_string(),
                provider: "azureOpenAI".to_string(),
            },
        };

        let built = EndpointRegistryBuilder::new()
            .with_snapshot(snapshot)
            .build()
            .unwrap();

        assert!(built.warning.is_some());
        assert!(built.value.default_model().is_empty());
        assert_eq!(built.value.len(), 1);
    }

    #[test]
    fn builder_rejects_duplicate_endpoint_ids() {
        let snapshot = RegistrySnapshot {
            endpoints: vec![
                azure_payload("a").with_id("dup"),
                azure_payload("b").with_id("dup"),
            ],
            default_model: DefaultModelSelection::empty(),
        };

        let res = EndpointRegistryBuilder::new().with_snapshot(snapshot).build();
        assert!(matches!(res, Err(HubError::Storage(_))));
    }

    #[test]
    fn metrics_record_mutations_and_cleared_defaults() {
        let metrics = Arc::new(CountingMetricsRecorder::new());
        let mut registry = EndpointRegistryBuilder::new()
            .with_metrics(metrics.clone())
            .build()
            .unwrap()
            .value;

        let endpoint = registry.upsert_endpoint(azure_payload("prod")).unwrap().value;
        let model = registry
            .upsert_model(&endpoint.id, Model::new("gpt-4o"))
            .unwrap()
            .value;
        registry.set_default(&endpoint.id, &model.id).unwrap();
        registry.toggle_endpoint(&endpoint.id).unwrap();
        registry
            .merge_discovered(&endpoint.id, &[FetchedModel::new("o3-mini")])
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.mutations_ok, 5);
        assert_eq!(snap.defaults_cleared, 1);
        assert_eq!(snap.discovery_runs, 1);
        assert_eq!(snap.models_discovered, 1);
    }
}
