use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::{GeminiEndpoint, GeminiSettings};
use crate::error::RelayError;
use crate::protocol::gemini::{GeminiModelEntry, GeminiModelsPage};

/// `owned_by` value reported for every Gemini model.
pub const MODEL_OWNER: &str = "google";

/// One addressable model, with the endpoint it routes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Caller-visible id; `{prefix_id}.{raw_id}` when the endpoint configures
    /// a prefix.
    pub id: String,
    /// Display name; falls back to the raw id.
    pub name: String,
    pub owned_by: String,
    #[serde(rename = "urlIdx", default, skip_serializing_if = "Option::is_none")]
    pub url_idx: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// The raw provider model object, when the model was discovered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<serde_json::Value>,
}

#[must_use]
pub fn exposed_model_id(prefix_id: &str, raw_id: &str) -> String {
    if prefix_id.is_empty() {
        raw_id.to_string()
    } else {
        format!("{prefix_id}.{raw_id}")
    }
}

fn descriptor_from_entry(entry: GeminiModelEntry) -> ModelDescriptor {
    let id = entry
        .name
        .strip_prefix("models/")
        .unwrap_or(&entry.name)
        .to_string();
    let name = entry.display_name.clone().unwrap_or_else(|| id.clone());
    let gemini = serde_json::to_value(&entry).ok();
    ModelDescriptor {
        id,
        name,
        owned_by: MODEL_OWNER.to_string(),
        url_idx: None,
        tags: Vec::new(),
        gemini,
    }
}

/// Walk the provider's paginated model listing, accumulating every entry.
///
/// Generic over the page-fetch call so the loop is testable without a
/// network. The first call passes no token; subsequent calls pass the
/// provider's `nextPageToken`. A token that fails to change between pages is
/// treated as a provider error rather than looping forever.
///
/// # Errors
///
/// Propagates fetch errors and fails on a repeated page token.
pub async fn discover_models<F, Fut>(mut fetch_page: F) -> Result<Vec<ModelDescriptor>, RelayError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<GeminiModelsPage, RelayError>>,
{
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch_page(page_token.clone()).await?;
        for entry in page.models {
            models.push(descriptor_from_entry(entry));
        }

        match page.next_page_token {
            Some(next) => {
                if page_token.as_deref() == Some(next.as_str()) {
                    return Err(RelayError::Translation(format!(
                        "model listing repeated page token '{next}'"
                    )));
                }
                page_token = Some(next);
            }
            None => break,
        }
    }

    Ok(models)
}

/// Discover the models of one endpoint over HTTP.
///
/// # Errors
///
/// Returns [`RelayError::Transport`] on connection failures,
/// [`RelayError::Upstream`] on non-2xx responses, and
/// [`RelayError::Translation`] on malformed listing payloads.
pub async fn fetch_endpoint_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<ModelDescriptor>, RelayError> {
    let base = base_url.trim_end_matches('/').to_string();
    let key = api_key.to_string();

    discover_models(move |page_token| {
        let client = client.clone();
        let base = base.clone();
        let key = key.clone();
        async move {
            let mut url = format!("{base}/models?key={key}");
            if let Some(token) = page_token {
                url.push_str("&pageToken=");
                url.push_str(&token);
            }

            let response = client
                .get(&url)
                .header(http::header::CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(|err| RelayError::Transport(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RelayError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<GeminiModelsPage>()
                .await
                .map_err(|err| {
                    RelayError::Translation(format!("failed to decode model listing: {err}"))
                })
        }
    })
    .await
}

fn static_endpoint_models(endpoint: &GeminiEndpoint, url_idx: usize) -> Vec<ModelDescriptor> {
    endpoint
        .model_ids
        .iter()
        .map(|model_id| ModelDescriptor {
            id: exposed_model_id(&endpoint.prefix_id, model_id),
            name: model_id.clone(),
            owned_by: MODEL_OWNER.to_string(),
            url_idx: Some(url_idx),
            tags: endpoint.tags.clone(),
            gemini: None,
        })
        .collect()
}

fn attribute_to_endpoint(model: &mut ModelDescriptor, endpoint: &GeminiEndpoint, url_idx: usize) {
    if !endpoint.prefix_id.is_empty() {
        model.id = exposed_model_id(&endpoint.prefix_id, &model.id);
    }
    if !endpoint.tags.is_empty() {
        model.tags = endpoint.tags.clone();
    }
    model.url_idx = Some(url_idx);
}

/// Resolve the models of every enabled endpoint, in endpoint order.
///
/// Endpoints with a static `model_ids` list are synthesized without a network
/// call; the rest are discovered. A failing endpoint is logged and
/// contributes nothing; aggregate listing never hard-fails on one endpoint.
pub async fn list_all_models(
    client: &reqwest::Client,
    settings: &GeminiSettings,
) -> Vec<ModelDescriptor> {
    let mut models = Vec::new();
    if !settings.enable {
        return models;
    }

    for (url_idx, endpoint) in settings.endpoints.iter().enumerate() {
        if !endpoint.enable {
            continue;
        }

        if !endpoint.model_ids.is_empty() {
            models.extend(static_endpoint_models(endpoint, url_idx));
            continue;
        }

        match fetch_endpoint_models(client, &endpoint.base_url, &endpoint.api_key).await {
            Ok(discovered) => {
                for mut model in discovered {
                    attribute_to_endpoint(&mut model, endpoint, url_idx);
                    models.push(model);
                }
            }
            Err(err) => {
                tracing::error!(url_idx, error = %err, "error fetching models from Gemini endpoint");
            }
        }
    }

    models
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn page(names: &[&str], next: Option<&str>) -> GeminiModelsPage {
        serde_json::from_value(json!({
            "models": names
                .iter()
                .map(|n| json!({"name": n, "displayName": format!("{n} display")}))
                .collect::<Vec<_>>(),
            "nextPageToken": next,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn pagination_follows_tokens_in_order() {
        let calls = RefCell::new(Vec::new());
        let models = discover_models(|token| {
            calls.borrow_mut().push(token.clone());
            let next_page = match token.as_deref() {
                None => page(&["models/gemini-one"], Some("A")),
                Some("A") => page(&["models/gemini-two"], Some("B")),
                Some("B") => page(&["models/gemini-three"], None),
                other => panic!("unexpected token {other:?}"),
            };
            async move { Ok(next_page) }
        })
        .await
        .unwrap();

        assert_eq!(
            calls.borrow().as_slice(),
            &[None, Some("A".to_string()), Some("B".to_string())]
        );
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["gemini-one", "gemini-two", "gemini-three"]);
    }

    #[tokio::test]
    async fn repeated_page_token_aborts_discovery() {
        let result = discover_models(|_token| async {
            Ok(page(&["models/gemini-pro"], Some("same")))
        })
        .await;
        assert!(matches!(result, Err(RelayError::Translation(_))));
    }

    #[tokio::test]
    async fn fetch_error_propagates() {
        let result = discover_models(|_token| async {
            Err::<GeminiModelsPage, _>(RelayError::Transport("refused".into()))
        })
        .await;
        assert!(matches!(result, Err(RelayError::Transport(_))));
    }

    #[test]
    fn entry_name_prefix_is_stripped_and_display_name_falls_back() {
        let entry: GeminiModelEntry =
            serde_json::from_value(json!({"name": "models/gemini-pro"})).unwrap();
        let model = descriptor_from_entry(entry);
        assert_eq!(model.id, "gemini-pro");
        assert_eq!(model.name, "gemini-pro");
        assert_eq!(model.owned_by, MODEL_OWNER);
        // The raw provider object rides along for later model resolution.
        assert_eq!(model.gemini.unwrap()["name"], "models/gemini-pro");
    }

    #[test]
    fn exposed_id_applies_prefix_with_dot() {
        assert_eq!(exposed_model_id("acme", "gemini-pro"), "acme.gemini-pro");
        assert_eq!(exposed_model_id("", "gemini-pro"), "gemini-pro");
    }

    #[test]
    fn static_models_are_synthesized_with_attribution() {
        let endpoint: GeminiEndpoint = serde_yaml::from_str(
            "base_url: https://example.com\napi_key: k\nmodel_ids: [gemini-pro, gemini-flash]\nprefix_id: acme\ntags: [internal]\n",
        )
        .unwrap();

        let models = static_endpoint_models(&endpoint, 2);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, "acme.gemini-pro");
        assert_eq!(models[0].name, "gemini-pro");
        assert_eq!(models[0].url_idx, Some(2));
        assert_eq!(models[0].tags, vec!["internal".to_string()]);
        assert!(models[0].gemini.is_none());
    }

    #[test]
    fn discovered_models_gain_prefix_and_tags() {
        let endpoint: GeminiEndpoint = serde_yaml::from_str(
            "base_url: https://example.com\napi_key: k\nprefix_id: acme\ntags: [prod]\n",
        )
        .unwrap();
        let entry: GeminiModelEntry =
            serde_json::from_value(json!({"name": "models/gemini-pro"})).unwrap();
        let mut model = descriptor_from_entry(entry);
        attribute_to_endpoint(&mut model, &endpoint, 0);
        assert_eq!(model.id, "acme.gemini-pro");
        assert_eq!(model.tags, vec!["prod".to_string()]);
        assert_eq!(model.url_idx, Some(0));
    }

    #[test]
    fn descriptor_serialization_omits_absent_fields() {
        let model = ModelDescriptor {
            id: "gemini-pro".into(),
            name: "Gemini Pro".into(),
            owned_by: MODEL_OWNER.into(),
            url_idx: None,
            tags: Vec::new(),
            gemini: None,
        };
        let value = serde_json::to_value(&model).unwrap();
        assert!(value.get("urlIdx").is_none());
        assert!(value.get("tags").is_none());
        assert!(value.get("gemini").is_none());
    }
}
