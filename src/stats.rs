//! Prometheus metrics.
//!
//! Recording helpers are no-ops until [`Metrics::install`] registered the
//! global recorder, so library code and tests can call them freely.

use crate::persistence::EntityCounts;
use axum::{routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::info;

/// Incoming text messages, labeled by `chat_id`
pub const MESSAGES_COUNT: &str = "messages_count";
/// Sent rule responses, labeled by `chat_id` and `rule`
pub const RESPONSES_COUNT: &str = "responses_count";
/// Stored entities, labeled by `type`
pub const ENTITIES_COUNT: &str = "entities_count";
/// Members per chat, labeled by `chat_id`
pub const USERS_IN_CHAT_COUNT: &str = "users_in_chat_count";
/// Time spent handling a single text message
pub const MESSAGE_PROCESSING_SECONDS: &str = "message_processing_seconds";

/// Handle to the installed Prometheus recorder
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if a recorder is already installed.
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Self { handle })
    }

    /// Current metrics in the Prometheus exposition format
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Router exposing `/metrics`
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }

    /// Serves `/metrics` on `0.0.0.0:port` until the process exits
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub async fn serve(self, port: u16) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        info!("Metrics endpoint listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await
    }
}

/// Counts an incoming text message
pub fn record_message(chat_id: i64) {
    counter!(MESSAGES_COUNT, "chat_id" => chat_id.to_string()).increment(1);
}

/// Counts a response produced by `rule`
pub fn record_response(chat_id: i64, rule: &str) {
    counter!(
        RESPONSES_COUNT,
        "chat_id" => chat_id.to_string(),
        "rule" => rule.to_string()
    )
    .increment(1);
}

/// Records how long handling a message took
pub fn record_processing_time(elapsed: Duration) {
    histogram!(MESSAGE_PROCESSING_SECONDS).record(elapsed.as_secs_f64());
}

/// Publishes stored entity counts
#[allow(clippy::cast_precision_loss)]
pub fn record_entity_counts(counts: &EntityCounts) {
    gauge!(ENTITIES_COUNT, "type" => "chat").set(counts.chats as f64);
    gauge!(ENTITIES_COUNT, "type" => "user").set(counts.users as f64);
    gauge!(ENTITIES_COUNT, "type" => "setting").set(counts.settings as f64);
    gauge!(ENTITIES_COUNT, "type" => "rating").set(counts.ratings as f64);
    for (chat_id, members) in &counts.users_per_chat {
        gauge!(USERS_IN_CHAT_COUNT, "chat_id" => chat_id.to_string()).set(*members as f64);
    }
}

/// Zeroes the member gauge of a chat that no longer exists
pub fn clear_chat_members(chat_id: i64) {
    gauge!(USERS_IN_CHAT_COUNT, "chat_id" => chat_id.to_string()).set(0.0);
}

/// Sums every sample of `metric` in a rendered exposition, optionally
/// restricted to samples carrying `label="value"`
#[must_use]
pub fn sum_samples(rendered: &str, metric: &str, label: Option<(&str, &str)>) -> f64 {
    let label = label.map(|(key, value)| format!("{key}=\"{value}\""));
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (series, value) = line.rsplit_once(' ')?;
            let name = series.split('{').next()?;
            if name != metric && name.strip_suffix("_total") != Some(metric) {
                return None;
            }
            if let Some(label) = &label {
                if !series.contains(label.as_str()) {
                    return None;
                }
            }
            value.trim().parse::<f64>().ok()
        })
        .sum()
}
