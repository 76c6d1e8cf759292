//! Serve command: local preview server with rebuild on change.

use super::build::build_site_with_config;
use super::load_config;
use anyhow::{Context, Result};
use axum::{
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the site, serve the destination and rebuild when sources change
pub async fn serve(config_path: &Path, host: &str, port: u16, drafts: bool) -> Result<()> {
    let config = load_config(config_path)?;
    build_site_with_config(&config, drafts).context("Failed to build site")?;

    let output_dir = config
        .destination_dir()
        .canonicalize()
        .context("Failed to resolve the destination")?;
    let source_dir = config
        .source_dir()
        .canonicalize()
        .context("Failed to resolve the site source")?;
    let base_url = config.normalized_base_url();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .context("Failed to initialize file watcher")?;
    watcher
        .watch(&source_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {:?}", source_dir))?;

    tokio::spawn({
        let config_path = config_path.to_path_buf();
        let output_dir = output_dir.clone();
        let source_dir = source_dir.clone();
        async move {
            while let Some(event) = rx.recv().await {
                let relevant = match event {
                    Ok(event) => triggers_rebuild(&event, &source_dir, &output_dir),
                    Err(err) => {
                        tracing::warn!("Watcher error: {}", err);
                        false
                    }
                };
                if !relevant {
                    continue;
                }

                // Drain the rest of the burst before rebuilding
                while rx.try_recv().is_ok() {}
                tracing::info!("Change detected, rebuilding site...");

                let res = tokio::task::spawn_blocking({
                    let config_path = config_path.clone();
                    move || {
                        let config = load_config(&config_path)?;
                        build_site_with_config(&config, drafts)
                    }
                })
                .await;

                match res {
                    Ok(Ok(_)) => tracing::info!("Rebuild complete"),
                    Ok(Err(e)) => tracing::error!("Rebuild failed: {:?}", e),
                    Err(e) => tracing::error!("Rebuild task panicked: {}", e),
                }
            }
        }
    });

    let app = router(output_dir, &base_url);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Serving at http://{}{}", addr, base_url);
    println!("\nServing at http://{}{}", addr, base_url);
    println!("   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    // keep the watcher alive for the lifetime of the server
    drop(watcher);
    Ok(())
}

/// Router serving `output_dir` under `base_url`, with the site's 404 page
pub fn router(output_dir: PathBuf, base_url: &str) -> Router {
    let not_found_page = Arc::new(output_dir.join("404.html"));
    let not_found = move || {
        let page = not_found_page.clone();
        async move { not_found_response(&page).await }
    };

    let files = ServeDir::new(&output_dir).not_found_service(not_found.clone().into_service());

    let prefix = base_url.trim_end_matches('/');
    let router = if prefix.is_empty() {
        Router::new().fallback_service(files)
    } else {
        let base = base_url.to_string();
        Router::new()
            .route("/", get(move || async move { Redirect::temporary(&base) }))
            .nest_service(prefix, files)
            .fallback(not_found)
    };

    router.layer(TraceLayer::new_for_http())
}

async fn not_found_response(page: &Path) -> Response {
    match tokio::fs::read_to_string(page).await {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Whether a watcher event should trigger a rebuild
///
/// Changes inside the destination (our own output) and in hidden
/// directories of the source (`.git`, editor swap files) are ignored.
fn triggers_rebuild(event: &Event, source_dir: &Path, output_dir: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_) | EventKind::Other) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| !path.starts_with(output_dir) && !is_hidden(source_dir, path))
}

fn is_hidden(source_dir: &Path, path: &Path) -> bool {
    let rel = path.strip_prefix(source_dir).unwrap_or(path);
    rel.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        name.starts_with('.') && name != "." && name != ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::fs;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn site() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("404.html"), "<h1>gone</h1>").unwrap();
        fs::create_dir_all(dir.path().join("2021/03/14")).unwrap();
        fs::write(dir.path().join("2021/03/14/post.html"), "<p>post</p>").unwrap();
        dir
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn serves_files_and_not_found_page() {
        let dir = site();
        let app = router(dir.path().to_path_buf(), "/");

        let (status, body) = get_path(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>home</h1>");

        let (status, body) = get_path(app.clone(), "/2021/03/14/post.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>post</p>");

        let (status, body) = get_path(app, "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "<h1>gone</h1>");
    }

    #[tokio::test]
    async fn serves_under_base_url() {
        let dir = site();
        let app = router(dir.path().to_path_buf(), "/blog/");

        let (status, body) = get_path(app.clone(), "/blog/2021/03/14/post.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>post</p>");

        let (status, _) = get_path(app.clone(), "/").await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);

        let (status, body) = get_path(app, "/elsewhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "<h1>gone</h1>");
    }

    #[test]
    fn ignores_output_and_hidden_paths() {
        let source = Path::new("/home/me/.sites/blog");
        let output = Path::new("/home/me/.sites/blog/_site");
        let modified = |path: &str| {
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from(path))
        };
        let check = |event: Event| triggers_rebuild(&event, source, output);

        assert!(check(modified("/home/me/.sites/blog/_posts/2021-01-01-a.md")));
        assert!(check(
            Event::new(EventKind::Create(CreateKind::File))
                .add_path(PathBuf::from("/home/me/.sites/blog/about.md"))
        ));
        assert!(!check(modified("/home/me/.sites/blog/_site/index.html")));
        assert!(!check(modified("/home/me/.sites/blog/.git/index")));
        assert!(!check(
            Event::new(EventKind::Access(AccessKind::Any))
                .add_path(PathBuf::from("/home/me/.sites/blog/about.md"))
        ));
    }
}
