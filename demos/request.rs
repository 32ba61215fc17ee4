//! Runs one request in each delivery style against a public JSON echo service.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=debug,hyper_util=off,hyper=off,reqwest=off,h2=off,rustls=off cargo run --example request --features tracing
//! ```
//!
//! Optionally log to a file:
//! ```sh
//! LOG_FILE=request.log RUST_LOG=debug,hyper_util=off,hyper=off,reqwest=off,h2=off,rustls=off cargo run --example request --features tracing
//! ```
//!
//! Point it elsewhere with `BASE_URL` (defaults to `https://httpbin.org`).

use std::fs::File;

use bgr_network::request::RequestSpec;
use bgr_network::types::{Method, Parameters, Value};
use bgr_network::{Client, Loading};
use futures::StreamExt as _;
use serde::Deserialize;
use tokio::sync::{oneshot, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// The parts of an httpbin echo this demo cares about.
#[derive(Debug, Deserialize)]
struct Echo {
    url: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    json: Option<Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "https://httpbin.org".to_owned());
    let client = Client::default();

    // Async call, parameters in the query string
    let get = RequestSpec::<Echo>::builder()
        .url(format!("{base_url}/get"))
        .parameters(Parameters::new().with("q", "x").with("page", 2))
        .build();
    match client.request(&get).await {
        Ok(echo) => info!(style = "async", url = %echo.url, args = %echo.args),
        Err(e) => error!(style = "async", error = %e),
    }

    // Callback, parameters as a JSON body
    let post = RequestSpec::<Echo>::builder()
        .url(format!("{base_url}/post"))
        .method(Method::Post)
        .parameters(Parameters::new().with("name", "widget").with("active", true))
        .headers(vec![("Accept-Language".to_owned(), "tr".to_owned())])
        .build();
    let (done_tx, done_rx) = oneshot::channel();
    client.request_with_callback(post, move |result| {
        match &result {
            Ok(echo) => info!(style = "callback", json = ?echo.json),
            Err(e) => error!(style = "callback", error = %e),
        }
        _ = done_tx.send(());
    });
    done_rx.await?;

    // Stream with a loading flag; a 404 shows the response error path
    let missing = RequestSpec::<Echo>::builder()
        .url(format!("{base_url}/status/404"))
        .build();
    let (loading_tx, mut loading_rx) = watch::channel(false);
    let watcher = tokio::spawn(async move {
        while loading_rx.changed().await.is_ok() {
            info!(loading = *loading_rx.borrow_and_update());
        }
    });

    let mut stream = Box::pin(client.request_stream(missing, Some(Loading::new(loading_tx))));
    while let Some(result) = stream.next().await {
        match result {
            Ok(echo) => info!(style = "stream", url = %echo.url),
            Err(e) => error!(style = "stream", kind = ?e.kind(), error = %e),
        }
    }
    drop(stream);
    watcher.await?;

    Ok(())
}
