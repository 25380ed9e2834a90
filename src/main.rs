use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod classifier;
mod config;
mod error;
mod gemini;
mod labels;
#[cfg(feature = "tensorflow")]
mod model;
mod preprocess;
mod recipe;
mod routes;
mod storage;
mod utils;

use classifier::{Classifier, ClassifierError, DishClassifier};
use config::Config;
use gemini::GeminiClient;
use labels::LabelSet;
use recipe::RecipeGenerator;
use routes::{router, AppState};
use storage::UploadStore;
use utils::ensure_artifact;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_service_rs=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    let uploads = UploadStore::open(&config.upload_dir)?;
    let classifier = load_classifier(&config, load_model).await.map(Arc::new);
    let recipes = load_recipe_generator(&config);

    let state = AppState {
        classifier,
        recipes,
        uploads: Arc::new(uploads),
        public_base_url: config.public_base_url.as_deref().map(Arc::from),
    };
    let app = router(state, config.body_limit_bytes());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads the labels and then the model. Any failure leaves the classifier unavailable.
async fn load_classifier<F>(config: &Config, load_model: F) -> Option<DishClassifier>
where
    F: FnOnce(&Config) -> Result<Box<dyn Classifier>, ClassifierError>,
{
    if let Err(e) = ensure_artifact(&config.model_path, config.model_url.as_deref()).await {
        tracing::error!("model download failed: {:#}", e);
        return None;
    }

    let labels = match &config.class_list_path {
        Some(path) => {
            if let Err(e) = ensure_artifact(path, config.class_list_url.as_deref()).await {
                tracing::error!("class list download failed: {:#}", e);
                return None;
            }
            LabelSet::from_file(path)
        }
        None => Ok(LabelSet::builtin()),
    };

    let classifier = labels.and_then(|labels| DishClassifier::new(load_model(config)?, labels));
    match classifier {
        Ok(classifier) => {
            tracing::info!(model = %config.model_path.display(), "classifier loaded");
            Some(classifier)
        }
        Err(e) => {
            tracing::error!(
                model = %config.model_path.display(),
                "classifier unavailable: {}", e
            );
            None
        }
    }
}

#[cfg(feature = "tensorflow")]
fn load_model(config: &Config) -> Result<Box<dyn Classifier>, ClassifierError> {
    let model =
        model::TensorflowModel::load(&config.model_path, &config.input_op, &config.output_op)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "tensorflow"))]
fn load_model(_config: &Config) -> Result<Box<dyn Classifier>, ClassifierError> {
    Err(ClassifierError::Load(
        "built without the `tensorflow` feature".to_string(),
    ))
}

fn load_recipe_generator(config: &Config) -> RecipeGenerator {
    let client = GeminiClient::new(
        config.google_api_key.clone().unwrap_or_default(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    );

    match client {
        Ok(client) => {
            tracing::info!(model = client.model_name(), "recipe generator configured");
            RecipeGenerator::new(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("recipe generator unavailable: {}", e);
            RecipeGenerator::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tests::peaked_at;
    use crate::preprocess::ImageTensor;
    use std::path::Path;

    fn config_for(model: &Path, class_list: Option<&Path>) -> Config {
        let mut args = vec![
            "recipe_service_rs".to_string(),
            "--model-path".to_string(),
            model.display().to_string(),
        ];
        if let Some(path) = class_list {
            args.push("--class-list-path".to_string());
            args.push(path.display().to_string());
        }
        Config::try_parse_from(args).unwrap()
    }

    fn thirteen_way(_config: &Config) -> Result<Box<dyn Classifier>, ClassifierError> {
        Ok(Box::new(peaked_at(10, 13)))
    }

    #[tokio::test]
    async fn missing_model_without_url_leaves_classifier_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir.path().join("frozen_graph.pb"), None);

        assert!(load_classifier(&config, load_model).await.is_none());
    }

    #[tokio::test]
    async fn garbage_model_file_leaves_classifier_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("frozen_graph.pb");
        std::fs::write(&model, b"not a graph").unwrap();

        assert!(load_classifier(&config_for(&model, None), load_model)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn class_list_shorter_than_model_output_leaves_classifier_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("frozen_graph.pb");
        std::fs::write(&model, b"").unwrap();
        let labels = dir.path().join("class_list.txt");
        std::fs::write(&labels, "Rendang\nSate\nSoto\n").unwrap();

        let config = config_for(&model, Some(&labels));
        assert!(load_classifier(&config, thirteen_way).await.is_none());
    }

    #[tokio::test]
    async fn empty_class_list_leaves_classifier_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("frozen_graph.pb");
        std::fs::write(&model, b"").unwrap();
        let labels = dir.path().join("class_list.txt");
        std::fs::write(&labels, "\n\n").unwrap();

        let config = config_for(&model, Some(&labels));
        assert!(load_classifier(&config, thirteen_way).await.is_none());
    }

    #[tokio::test]
    async fn matching_class_list_is_used_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("frozen_graph.pb");
        std::fs::write(&model, b"").unwrap();
        let labels = dir.path().join("class_list.txt");
        let names: Vec<String> = (0..13).map(|i| format!("dish_{i}")).collect();
        std::fs::write(&labels, names.join("\n")).unwrap();

        let classifier = load_classifier(&config_for(&model, Some(&labels)), thirteen_way)
            .await
            .unwrap();
        let result = classifier.classify(&ImageTensor::zeros()).unwrap();
        assert_eq!(result.label, "dish_10");
        assert_eq!(result.display_name, "Dish 10");
    }
}
