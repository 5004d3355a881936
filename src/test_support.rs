//! Local HTTP fixtures for adapter and self-update tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;

use crate::config::{Config, ServiceInstance, DEFAULT_INSTANCE};

/// Serves `app` on an ephemeral loopback port and returns its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A server that answers every request with 200 and counts them.
pub async fn spawn_counting() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "{}"
        }
    });
    (spawn_server(app).await, hits)
}

pub fn instance(url: &str, credential: &str) -> ServiceInstance {
    ServiceInstance {
        name: DEFAULT_INSTANCE.to_string(),
        url: url.to_string(),
        credential: credential.to_string(),
        enabled: true,
    }
}

pub fn empty_config() -> Config {
    Config::from_lookup(|_| None)
}
