//! Selectable default options and reconciliation of the stored default.

use modelhub_core::{DefaultModelSelection, Endpoint, SelectableOption, SelectionWarning};

/// One option per model across all endpoints, in registry order.
///
/// An option is selectable only when both the model and its endpoint are
/// enabled.
pub fn compute_selectable_options(endpoints: &[Endpoint]) -> Vec<SelectableOption> {
    endpoints
        .iter()
        .flat_map(|endpoint| {
            endpoint.models.iter().map(move |model| SelectableOption {
                endpoint_id: endpoint.id.clone(),
                model_id: model.id.clone(),
                provider: endpoint.provider.as_str().to_string(),
                label: format!("{} / {}", endpoint.name, model.label()),
                is_selectable: endpoint.enabled && model.enabled,
            })
        })
        .collect()
}

/// Check `current` against the registry.
///
/// A selection missing either id comes back as the exact empty selection,
/// without a warning. One pointing at a selectable option comes back with
/// its provider refreshed from the endpoint. Anything else is demoted to the
/// empty selection and a warning is returned.
pub fn reconcile(
    endpoints: &[Endpoint],
    current: &DefaultModelSelection,
) -> (DefaultModelSelection, Option<SelectionWarning>) {
    if current.endpoint_id.trim().is_empty() || current.model_id.trim().is_empty() {
        return (DefaultModelSelection::empty(), None);
    }

    let selectable = compute_selectable_options(endpoints)
        .into_iter()
        .find(|option| option.matches(current) && option.is_selectable);

    match selectable {
        Some(option) => (option.to_selection(), None),
        None => {
            let warning = SelectionWarning {
                previous: current.clone(),
            };
            (DefaultModelSelection::empty(), Some(warning))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelhub_core::{Auth, Connection, Model, Provider};

    fn endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::new(
                "prod",
                Provider::AzureOpenAI,
                Connection::new("https://prod.openai.azure.com", "2024-10-21"),
                Auth::api_key("k"),
            )
            .with_id("e1")
            .with_model(Model::new("gpt-4o").with_id("m1"))
            .with_model(Model::new("o3-mini").with_id("m2").with_enabled(false)),
            Endpoint::new(
                "lab",
                Provider::AiFoundry,
                Connection::new("https://x/api/projects/lab", "2024-10-21"),
                Auth::managed_identity(),
            )
            .with_id("e2")
            .with_model(Model::new("phi-4").with_id("m3").with_display_name("Phi 4")),
        ]
    }

    fn selection(endpoint_id: &str, model_id: &str) -> DefaultModelSelection {
        DefaultModelSelection {
            endpoint_id: endpoint_id.to_string(),
            model_id: model_id.to_string(),
            provider: "azureOpenAI".to_string(),
        }
    }

    #[test]
    fn options_cover_every_model() {
        let options = compute_selectable_options(&endpoints());

        assert_eq!(options.len(), 3);
        assert!(options[0].is_selectable);
        assert!(!options[1].is_selectable);
        assert_eq!(options[2].label, "lab / Phi 4");
        assert_eq!(options[2].provider, "aiFoundry");
    }

    #[test]
    fn disabled_endpoint_makes_all_models_unselectable() {
        let mut endpoints = endpoints();
        endpoints[1].enabled = false;

        let options = compute_selectable_options(&endpoints);
        assert!(!options[2].is_selectable);
    }

    #[test]
    fn empty_selection_is_left_alone() {
        let (validated, warning) = reconcile(&endpoints(), &DefaultModelSelection::empty());
        assert!(validated.is_empty());
        assert!(warning.is_none());
    }

    #[test]
    fn selectable_default_is_kept() {
        let current = selection("e1", "m1");
        let (validated, warning) = reconcile(&endpoints(), &current);
        assert_eq!(validated, current);
        assert!(warning.is_none());
    }

    #[test]
    fn disabled_model_default_is_cleared() {
        let (validated, warning) = reconcile(&endpoints(), &selection("e1", "m2"));
        assert_eq!(validated, DefaultModelSelection::empty());
        let warning = warning.expect("warning for stale default");
        assert_eq!(warning.previous.model_id, "m2");
        assert_eq!(
            warning.to_string(),
            "the previous default is no longer available."
        );
    }

    #[test]
    fn stale_provider_is_refreshed() {
        let mut current = selection("e2", "m3");
        current.provider = "azureOpenAI".to_string();

        let (validated, warning) = reconcile(&endpoints(), &current);
        assert_eq!(validated.provider, "aiFoundry");
        assert_eq!(validated.model_id, "m3");
        assert!(warning.is_none());
    }

    #[test]
    fn half_blank_selection_becomes_exactly_empty() {
        let leftover = DefaultModelSelection {
            endpoint_id: String::new(),
            model_id: String::new(),
            provider: "azureOpenAI".to_string(),
        };
        let (validated, warning) = reconcile(&endpoints(), &leftover);
        assert_eq!(validated, DefaultModelSelection::empty());
        assert!(warning.is_none());

        let (validated, _) = reconcile(&endpoints(), &selection("e1", " "));
        assert_eq!(validated, DefaultModelSelection::empty());
    }

    #[test]
    fn missing_default_is_cleared() {
        let (validated, warning) = reconcile(&endpoints(), &selection("e9", "m1"));
        assert!(validated.is_empty());
        assert!(warning.is_some());

        // Model id from another endpoint does not count.
        let (validated, _) = reconcile(&endpoints(), &selection("e2", "m1"));
        assert!(validated.is_empty());
    }
}
