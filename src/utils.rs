use std::{env, path::Path};

use anyhow::{bail, Context};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

async fn download_file(url: &str, path: &Path) -> anyhow::Result<()> {
    tracing::info!(url, path = %path.display(), "downloading model artifact");

    let mut header_map = HeaderMap::new();

    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("invalid GITHUB_TOKEN format")?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let response = reqwest::Client::new()
        .get(url)
        .headers(header_map)
        .send()
        .await
        .with_context(|| format!("failed to request {}", url))?;

    if !response.status().is_success() {
        bail!("failed to download {}: {}", url, response.status());
    }

    let bytes = response.bytes().await.context("failed to read body")?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Downloads `path` from `url` unless it already exists. Without a URL a missing file is left
/// for the loader to report.
pub async fn ensure_artifact(path: &Path, url: Option<&str>) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }

    match url {
        Some(url) => download_file(url, path).await,
        None => {
            tracing::warn!(
                path = %path.display(),
                "artifact missing and no download URL configured"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn missing_artifact_is_downloaded() {
        let router = Router::new().route("/labels.txt", get(|| async { "Rendang\nSate\n" }));
        let base = serve(router).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model").join("labels.txt");

        ensure_artifact(&path, Some(&format!("{base}/labels.txt")))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Rendang\nSate\n");
    }

    #[tokio::test]
    async fn existing_artifact_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "Soto\n").unwrap();

        ensure_artifact(&path, Some("http://127.0.0.1:1/unused"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Soto\n");
    }

    #[tokio::test]
    async fn failed_download_is_an_error() {
        let base = serve(Router::new().route(
            "/model.pb",
            get(|| async { StatusCode::NOT_FOUND }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pb");

        assert!(ensure_artifact(&path, Some(&format!("{base}/model.pb")))
            .await
            .is_err());
        assert!(!path.exists());
    }
}
