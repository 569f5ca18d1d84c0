use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use modelhub_config::HubConfig;
use modelhub_core::{Endpoint, HubError, Model, SelectionWarning};
use modelhub_providers::{discover_models, test_connection, HttpProviderClient};
use modelhub_registry::{
    validate, DeleteOutcome, EndpointRegistry, EndpointRegistryBuilder, JsonFileStore,
    RegistryStore,
};
use modelhub_telemetry::CountingMetricsRecorder;

/// Registry loaded for one command, plus where to save it.
pub struct Session {
    config: HubConfig,
    store: JsonFileStore,
    registry: EndpointRegistry,
    metrics: Arc<CountingMetricsRecorder>,
}

impl Session {
    pub fn open(config: HubConfig, registry_path: PathBuf) -> anyhow::Result<Self> {
        let store = JsonFileStore::new(registry_path);
        let snapshot = store
            .load()
            .with_context(|| format!("loading {}", store.path().display()))?;

        let metrics = Arc::new(CountingMetricsRecorder::new());
        let built = EndpointRegistryBuilder::new()
            .with_snapshot(snapshot)
            .with_confirm_window(config.deletion.confirm_window())
            .with_metrics(metrics.clone())
            .build()?;
        report_warning(built.warning.as_ref());

        tracing::debug!(
            path = %store.path().display(),
            endpoints = built.value.len(),
            "registry loaded"
        );

        Ok(Self {
            config,
            store,
            registry: built.value,
            metrics,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.store
            .save(&self.registry.snapshot())
            .with_context(|| format!("saving {}", self.store.path().display()))?;

        let counts = self.metrics.snapshot();
        tracing::debug!(
            mutations = counts.mutations_ok,
            rejected = counts.mutations_failed,
            defaults_cleared = counts.defaults_cleared,
            "registry saved"
        );
        Ok(())
    }

    fn endpoint(&self, id: &str) -> anyhow::Result<&Endpoint> {
        self.registry
            .get(id)
            .ok_or_else(|| HubError::EndpointNotFound(id.to_string()).into())
    }

    fn client(&self) -> anyhow::Result<HttpProviderClient> {
        Ok(HttpProviderClient::new(self.config.http.timeout())?)
    }
}

/// Fields accepted by `add-model`.
pub struct ModelArgs {
    pub id: Option<String>,
    pub deployment_name: String,
    pub display_name: Option<String>,
    pub model_name: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
}

impl ModelArgs {
    fn into_model(self) -> Model {
        let mut model = Model::new(self.deployment_name).with_enabled(self.enabled);
        if let Some(id) = self.id {
            model.id = id;
        }
        if let Some(display_name) = self.display_name {
            model.display_name = display_name;
        }
        if let Some(model_name) = self.model_name {
            model.model_name = model_name;
        }
        if let Some(description) = self.description {
            model.description = description;
        }
        model
    }
}

fn report_warning(warning: Option<&SelectionWarning>) {
    if let Some(warning) = warning {
        println!("warning: {}", warning);
    }
}

pub fn check(session: &Session) -> anyhow::Result<()> {
    let mut invalid = 0;
    for endpoint in session.registry.endpoints() {
        if let Err(err) = validate(endpoint) {
            invalid += 1;
            println!("{} ({}): {}", endpoint.name, endpoint.id, err);
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} endpoint(s) failed validation", invalid);
    }

    println!(
        "configuration ok, {} endpoint(s) valid",
        session.registry.len()
    );
    Ok(())
}

pub fn list(session: &Session, json: bool) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&session.registry.snapshot())?
        );
        return Ok(());
    }

    let registry = &session.registry;
    if registry.is_empty() {
        println!("no endpoints");
    }

    for endpoint in registry.endpoints() {
        println!(
            "{} [{}] {} {}",
            endpoint.id,
            if endpoint.enabled { "on" } else { "off" },
            endpoint.name,
            endpoint.provider
        );
        println!("    {}", endpoint.connection.endpoint);
        for model in &endpoint.models {
            println!(
                "    - {} [{}] {}{}",
                model.id,
                if model.enabled { "on" } else { "off" },
                model.label(),
                if model.is_discovered { " (discovered)" } else { "" }
            );
        }
    }

    let default = registry.default_model();
    if default.is_empty() {
        println!("default: <none>");
    } else {
        let label = registry
            .selectable_options()
            .into_iter()
            .find(|option| option.matches(default))
            .map(|option| option.label)
            .unwrap_or_default();
        println!("default: {}", label);
    }

    Ok(())
}

pub fn add_endpoint(session: &mut Session, file: &Path) -> anyhow::Result<()> {
    let content =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let payload: Endpoint = serde_json::from_str(&content)
        .with_context(|| format!("parsing endpoint payload {}", file.display()))?;

    let outcome = session.registry.upsert_endpoint(payload)?;
    report_warning(outcome.warning.as_ref());
    session.save()?;

    println!("{}", outcome.value.id);
    Ok(())
}

pub fn toggle_endpoint(session: &mut Session, endpoint_id: &str) -> anyhow::Result<()> {
    let outcome = session.registry.toggle_endpoint(endpoint_id)?;
    report_warning(outcome.warning.as_ref());
    session.save()?;

    println!(
        "endpoint {} {}",
        endpoint_id,
        if outcome.value { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub fn delete_endpoint(session: &mut Session, endpoint_id: &str, yes: bool) -> anyhow::Result<()> {
    let mut outcome = session.registry.delete_endpoint(endpoint_id)?;
    if yes && outcome.value == DeleteOutcome::ConfirmAgain {
        outcome = session.registry.delete_endpoint(endpoint_id)?;
    }

    finish_delete(session, outcome.value, outcome.warning.as_ref())
}

pub fn add_model(session: &mut Session, endpoint_id: &str, args: ModelArgs) -> anyhow::Result<()> {
    let outcome = session.registry.upsert_model(endpoint_id, args.into_model())?;
    report_warning(outcome.warning.as_ref());
    session.save()?;

    println!("{}", outcome.value.id);
    Ok(())
}

pub fn toggle_model(session: &mut Session, endpoint_id: &str, model_id: &str) -> anyhow::Result<()> {
    let outcome = session.registry.toggle_model(endpoint_id, model_id)?;
    report_warning(outcome.warning.as_ref());
    session.save()?;

    println!(
        "model {} {}",
        model_id,
        if outcome.value { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub fn delete_model(
    session: &mut Session,
    endpoint_id: &str,
    model_id: &str,
    yes: bool,
) -> anyhow::Result<()> {
    let mut outcome = session.registry.delete_model(endpoint_id, model_id)?;
    if yes && outcome.value == DeleteOutcome::ConfirmAgain {
        outcome = session.registry.delete_model(endpoint_id, model_id)?;
    }

    finish_delete(session, outcome.value, outcome.warning.as_ref())
}

fn finish_delete(
    session: &Session,
    outcome: DeleteOutcome,
    warning: Option<&SelectionWarning>,
) -> anyhow::Result<()> {
    match outcome {
        DeleteOutcome::Deleted => {
            report_warning(warning);
            session.save()?;
            println!("deleted");
        }
        DeleteOutcome::ConfirmAgain => {
            println!("pass --yes to confirm the deletion");
        }
    }
    Ok(())
}

pub fn set_default(session: &mut Session, endpoint_id: &str, model_id: &str) -> anyhow::Result<()> {
    let selection = session.registry.set_default(endpoint_id, model_id)?;
    session.save()?;

    println!("default set to {}/{}", selection.endpoint_id, selection.model_id);
    Ok(())
}

pub fn clear_default(session: &mut Session) -> anyhow::Result<()> {
    session.registry.clear_default();
    session.save()?;

    println!("default cleared");
    Ok(())
}

pub async fn discover(session: &mut Session, endpoint_id: &str) -> anyhow::Result<()> {
    let client = session.client()?;
    let outcome = discover_models(&mut session.registry, &client, endpoint_id).await?;
    report_warning(outcome.warning.as_ref());
    session.save()?;

    println!("{} new model(s) added disabled", outcome.value);
    Ok(())
}

pub async fn test(session: &Session, endpoint_id: &str, deployment_name: &str) -> anyhow::Result<()> {
    let client = session.client()?;
    let endpoint = session.endpoint(endpoint_id)?;
    let result = test_connection(&client, endpoint, deployment_name).await?;

    if result.success {
        println!("ok: {}", result.message);
        Ok(())
    } else {
        anyhow::bail!("connection test failed: {}", result.message)
    }
}
