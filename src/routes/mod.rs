use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};

use crate::broadcast::BroadcastEvent;
use crate::state::AppState;

pub mod game;
pub mod stream;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(game::index).post(game::submit_guess))
        .route("/stream", get(stream::feed_stream))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// The wire shape of one feed line, shared by the backfilled page and the
/// live stream.
pub(crate) fn feed_fragment(event: &BroadcastEvent) -> String {
    format!("<li>{}</li>", escape_html(&event.text))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_escape_submitted_names() {
        let event = BroadcastEvent { id: 1, text: "<script> & \"Awa\" wins".to_string() };
        assert_eq!(
            feed_fragment(&event),
            "<li>&lt;script&gt; &amp; &quot;Awa&quot; wins</li>"
        );
    }
}
