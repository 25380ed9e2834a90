use std::sync::Arc;

use async_trait::async_trait;

pub const RECIPE_UNAVAILABLE: &str = "Maaf, fitur pembuatan resep sedang tidak tersedia.";
pub const RECIPE_FAILED: &str = "Maaf, terjadi kesalahan saat mencoba membuat resep dari AI.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no text in response")]
    EmptyResponse,
}

/// Free-text completion backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeOutcome {
    Generated(String),
    Failed,
    Unavailable,
}

impl RecipeOutcome {
    pub fn into_text(self) -> String {
        match self {
            RecipeOutcome::Generated(text) => text,
            RecipeOutcome::Failed => RECIPE_FAILED.to_string(),
            RecipeOutcome::Unavailable => RECIPE_UNAVAILABLE.to_string(),
        }
    }
}

pub fn build_prompt(dish: &str) -> String {
    format!(
        "Anda adalah seorang koki ahli masakan Indonesia.\n\
         Berikan resep yang lezat dan mudah diikuti untuk masakan '{dish}'.\n\
         Gunakan format Markdown yang jelas, mencakup 'Deskripsi Singkat', 'Bahan-bahan', \
         dan 'Langkah-langkah Pembuatan'."
    )
}

#[derive(Clone)]
pub struct RecipeGenerator {
    backend: Option<Arc<dyn TextGenerator>>,
}

impl RecipeGenerator {
    pub fn new(backend: Arc<dyn TextGenerator>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Never fails: backend errors are logged and folded into [`RecipeOutcome::Failed`].
    pub async fn recipe_for(&self, dish: &str) -> RecipeOutcome {
        let Some(backend) = &self.backend else {
            return RecipeOutcome::Unavailable;
        };

        match backend.generate(&build_prompt(dish)).await {
            Ok(text) => RecipeOutcome::Generated(text),
            Err(e) => {
                tracing::error!(dish, error = %e, "recipe generation failed");
                RecipeOutcome::Failed
            }
        }
    }
}
