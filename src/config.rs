use std::path::PathBuf;

use clap::Parser;

use crate::gemini::DEFAULT_BASE_URL;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "recipe_service_rs",
    about = "Classifies food photos and returns a generated recipe"
)]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Frozen TensorFlow graph of the dish classifier
    #[arg(long, env = "MODEL_PATH", default_value = "./models/frozen_graph.pb")]
    pub model_path: PathBuf,

    #[arg(long, env = "MODEL_INPUT_OP", default_value = "x")]
    pub input_op: String,

    #[arg(long, env = "MODEL_OUTPUT_OP", default_value = "Identity")]
    pub output_op: String,

    /// Newline-separated labels in model output order. Built-in labels when unset.
    #[arg(long, env = "CLASS_LIST_PATH")]
    pub class_list_path: Option<PathBuf>,

    /// Fetched into `model_path` at startup when the file is missing
    #[arg(long, env = "MODEL_URL")]
    pub model_url: Option<String>,

    #[arg(long, env = "CLASS_LIST_URL")]
    pub class_list_url: Option<String>,

    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Base of the `image_url` field, e.g. `https://food.example.com`
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Request body cap in megabytes. Uploads are unbounded when unset.
    #[arg(long, env = "BODY_LIMIT_MB")]
    pub body_limit_mb: Option<usize>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash")]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn body_limit_bytes(&self) -> Option<usize> {
        self.body_limit_mb.map(|mb| mb * 1024 * 1024)
    }
}
