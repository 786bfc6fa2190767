use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;

use super::feed_fragment;
use crate::broadcast::{self, BroadcastEvent};
use crate::payout::{PayoutOutcome, PayoutRequest};
use crate::phone;
use crate::state::AppState;
use crate::types::{GuessForm, RoundOutcome};

const HISTORY_BACKFILL: i64 = 20;

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, String)> {
    let history = broadcast::recent_delivered(&state.db, HISTORY_BACKFILL)
        .await
        .map_err(storage_error)?;

    Ok(Html(render_index(&history)))
}

pub async fn submit_guess(
    State(state): State<AppState>,
    Form(form): Form<GuessForm>,
) -> Html<String> {
    let outcome = play_round(&state, &form).await;
    Html(render_result(&outcome))
}

/// Runs one submission through the whole game:
/// validate phone -> resolve credential -> judge -> payout -> feed line.
pub async fn play_round(state: &AppState, form: &GuessForm) -> RoundOutcome {
    let phone = match phone::normalize(&form.number) {
        Ok(p) => p,
        Err(_) => {
            tracing::info!(name = %form.name, "rejected: unparseable phone number");
            return RoundOutcome::InvalidPhone;
        }
    };

    let Some(api_key) = state.config.api_keys.get(&phone.country_code) else {
        tracing::info!(country = phone.country_code, "rejected: no payout credential");
        return RoundOutcome::UnsupportedCountry;
    };

    if !state.config.winning_range.contains(form.guess) {
        record_event(state, &format!("{} guessed wrong.", form.name)).await;
        return RoundOutcome::Loss { name: form.name.clone() };
    }

    let amount = state.config.prize_amount;
    let request = PayoutRequest::for_winner(&phone, &form.name, amount, &state.config.currency);
    let outcome = state.payout.payout(api_key, &request).await;

    let won = match &outcome {
        PayoutOutcome::Success => true,
        PayoutOutcome::IdempotencyConflict if state.config.conflict_is_win => {
            tracing::warn!(key = %request.idempotency_key, "conflict counted as a prior win");
            true
        }
        _ => false,
    };

    if won {
        record_event(state, &format!("{} wins {amount} CFA!!", form.name)).await;
        return RoundOutcome::Win { name: form.name.clone(), amount };
    }

    RoundOutcome::PayoutRefused { outcome }
}

/// The response is already decided by the time a feed line is written; a
/// feed hiccup must not turn it into an error.
async fn record_event(state: &AppState, text: &str) {
    if let Err(e) = broadcast::append(&state.db, text).await {
        tracing::error!("failed to append broadcast event: {e}");
    }
}

fn storage_error(e: sqlx::Error) -> (StatusCode, String) {
    tracing::error!("storage error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Something went wrong, try again later.".to_string(),
    )
}

fn render_result(outcome: &RoundOutcome) -> String {
    let message = match outcome {
        RoundOutcome::Win { name, amount } => {
            format!("Bravo {name}! {amount} CFA is on its way to your wallet.")
        }
        RoundOutcome::Loss { name } => format!("Wrong answer, {name}. Try again!"),
        RoundOutcome::InvalidPhone => "That doesn't look like a phone number.".to_string(),
        RoundOutcome::UnsupportedCountry => "Only +221 and +225 numbers can play.".to_string(),
        RoundOutcome::PayoutRefused { outcome } => outcome.user_message(),
    };

    format!(
        r#"<!doctype html>
<html>
<body>
<p>{}</p>
<p><a href="/">Play again</a></p>
</body>
</html>
"#,
        super::escape_html(&message)
    )
}

fn render_index(history: &[BroadcastEvent]) -> String {
    let items: String = history.iter().map(|e| format!("  {}\n", feed_fragment(e))).collect();

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Guess &amp; Win</title></head>
<body>
<h1>Guess the number, win the pot</h1>
<form method="post" action="/">
  <label>Name <input name="name" required></label>
  <label>Phone <input name="number" placeholder="+221 77 123 45 67" required></label>
  <label>Your guess <input name="guess" type="number" required></label>
  <button type="submit">Play</button>
</form>
<h2>Latest results</h2>
<ul id="feed">
{items}</ul>
<script>
  const feed = document.getElementById("feed");
  const source = new EventSource("/stream");
  source.addEventListener("message", (e) => {{
    feed.insertAdjacentHTML("afterbegin", e.data);
  }});
</script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::judge::WinningRange;
    use crate::payout::PayoutClient;

    // The payout URL is never reached by these tests: input rejections and
    // losses terminate before the client is used.
    async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("game.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        broadcast::init_schema(&pool).await.unwrap();

        let config = Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            payout_api_url: "http://127.0.0.1:9/v1/payout".to_string(),
            payout_timeout: Duration::from_secs(1),
            prize_amount: 500,
            currency: "XOF".to_string(),
            winning_range: WinningRange::new(40, 50).unwrap(),
            api_keys: HashMap::from([
                (221, "key-sn".to_string()),
                (225, "key-ci".to_string()),
            ]),
            conflict_is_win: false,
            stream_poll_interval: Duration::from_millis(50),
        };
        let payout = PayoutClient::new(&config.payout_api_url, config.payout_timeout).unwrap();

        (AppState { db: pool, config: Arc::new(config), payout }, dir)
    }

    fn form(name: &str, number: &str, guess: i64) -> GuessForm {
        GuessForm { name: name.to_string(), number: number.to_string(), guess }
    }

    #[tokio::test]
    async fn bad_phone_is_rejected_before_anything_else() {
        let (state, _dir) = test_state().await;

        let outcome = play_round(&state, &form("Awa", "notanumber", 42)).await;
        assert_eq!(outcome, RoundOutcome::InvalidPhone);

        let rows = broadcast::poll_undelivered(&state.db, 10).await.unwrap();
        assert!(rows.is_empty(), "input errors must not reach the feed");
    }

    #[tokio::test]
    async fn foreign_number_is_turned_away() {
        let (state, _dir) = test_state().await;

        let outcome = play_round(&state, &form("Chloé", "+33612345678", 42)).await;
        assert_eq!(outcome, RoundOutcome::UnsupportedCountry);

        let rows = broadcast::poll_undelivered(&state.db, 10).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn wrong_guess_lands_in_the_feed() {
        let (state, _dir) = test_state().await;

        let outcome = play_round(&state, &form("Koffi", "+2250708112233", 5)).await;
        assert_eq!(outcome, RoundOutcome::Loss { name: "Koffi".to_string() });

        let rows = broadcast::poll_undelivered(&state.db, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "Koffi guessed wrong.");
    }

    #[test]
    fn index_backfills_escaped_history() {
        let history = vec![
            BroadcastEvent { id: 2, text: "Awa wins 500 CFA!!".to_string() },
            BroadcastEvent { id: 1, text: "<Koffi> guessed wrong.".to_string() },
        ];
        let page = render_index(&history);
        assert!(page.contains("<li>Awa wins 500 CFA!!</li>"));
        assert!(page.contains("<li>&lt;Koffi&gt; guessed wrong.</li>"));
        assert!(page.contains(r#"new EventSource("/stream")"#));
    }
}
