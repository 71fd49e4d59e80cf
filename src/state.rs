use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::config::AppConfig;
use crate::error::RelayError;
use crate::registry::{self, ModelDescriptor};

/// Where a caller-visible model id routes.
#[derive(Debug, Clone)]
pub struct ModelTarget {
    pub url_idx: usize,
    /// Provider-side model id; may still carry a `models/` path segment,
    /// which the completion path strips before use.
    pub upstream_id: String,
}

/// Lookup table from caller-visible model id to its endpoint and provider id.
#[derive(Debug, Default)]
pub struct ModelTable {
    targets: FxHashMap<String, ModelTarget>,
}

impl ModelTable {
    #[must_use]
    pub fn from_descriptors(models: &[ModelDescriptor]) -> Self {
        let mut targets = FxHashMap::default();
        for model in models {
            let Some(url_idx) = model.url_idx else {
                continue;
            };
            targets.insert(
                model.id.clone(),
                ModelTarget {
                    url_idx,
                    upstream_id: upstream_model_id(model),
                },
            );
        }
        Self { targets }
    }

    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<&ModelTarget> {
        self.targets.get(model_id)
    }
}

/// Provider-side id for a listed model: the discovered provider object's
/// `name` when present, then the listed name, then the exposed id.
fn upstream_model_id(model: &ModelDescriptor) -> String {
    if let Some(name) = model
        .gemini
        .as_ref()
        .and_then(|gemini| gemini.get("name"))
        .and_then(serde_json::Value::as_str)
    {
        if !name.is_empty() {
            return name.to_string();
        }
    }
    if !model.name.is_empty() {
        return model.name.clone();
    }
    model.id.clone()
}

/// Process-wide state: the immutable configuration snapshot plus the
/// refreshable model table. Readers take an `Arc` snapshot of the table once
/// per request; refreshes replace it wholesale.
pub struct AppState {
    pub config: AppConfig,
    models: RwLock<Arc<ModelTable>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            models: RwLock::new(Arc::new(ModelTable::default())),
        }
    }

    #[must_use]
    pub fn models_snapshot(&self) -> Arc<ModelTable> {
        self.models.read().clone()
    }

    pub fn install_models(&self, models: &[ModelDescriptor]) {
        *self.models.write() = Arc::new(ModelTable::from_descriptors(models));
    }

    /// Scoped client for model-listing calls (short timeout budget).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the client cannot be built.
    pub fn listing_client(&self) -> Result<reqwest::Client, RelayError> {
        build_client(self.config.server.model_list_timeout)
    }

    /// Scoped client for completion calls (long timeout budget).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the client cannot be built.
    pub fn completion_client(&self) -> Result<reqwest::Client, RelayError> {
        build_client(self.config.server.timeout)
    }

    /// Re-resolve all models and replace the table.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] when the listing client cannot be
    /// built; per-endpoint discovery failures degrade inside the resolver.
    pub async fn refresh_models(&self) -> Result<Vec<ModelDescriptor>, RelayError> {
        let client = self.listing_client()?;
        let models = registry::list_all_models(&client, &self.config.gemini).await;
        self.install_models(&models);
        Ok(models)
    }

    /// Look a caller-visible model id up, refreshing the table once on a
    /// miss before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ModelNotFound`] when the id stays unknown after
    /// a refresh.
    pub async fn resolve_model(&self, model_id: &str) -> Result<ModelTarget, RelayError> {
        if let Some(target) = self.models_snapshot().get(model_id) {
            return Ok(target.clone());
        }

        self.refresh_models().await?;
        self.models_snapshot()
            .get(model_id)
            .cloned()
            .ok_or_else(|| RelayError::ModelNotFound(model_id.to_string()))
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, RelayError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(5))
        .tcp_nodelay(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| RelayError::Transport(format!("Failed to build HTTP client: {err}")))
}
