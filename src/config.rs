use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::judge::WinningRange;

/// Everything the process needs, read once at startup. A missing or
/// malformed variable aborts boot instead of surfacing mid-game.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub payout_api_url: String,
    pub payout_timeout: Duration,
    pub prize_amount: u64,
    pub currency: String,
    pub winning_range: WinningRange,
    /// Payout credential per dialing code. Numbers outside this map can play
    /// the form but are turned away before the judge runs.
    pub api_keys: HashMap<u16, String>,
    /// Historical behavior: treat an idempotency conflict as proof the wallet
    /// was already paid and show a win. Off by default; conflicts are errors.
    pub conflict_is_win: bool,
    pub stream_poll_interval: Duration,
}

fn required(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("missing required env: {name}"))?;
    if value.trim().is_empty() {
        bail!("required env {name} is empty");
    }
    Ok(value)
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_u64_or(name: &str, default: u64) -> Result<u64> {
    match optional(name) {
        Some(v) => v.parse::<u64>().with_context(|| format!("invalid {name}: {v}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let bind_addr = optional("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("invalid BIND_ADDR")?;

        let database_url = required("DATABASE_URL")?;
        let payout_api_url = required("PAYOUT_API_URL")?;
        let payout_timeout = Duration::from_secs(parse_u64_or("PAYOUT_TIMEOUT_SECS", 10)?);

        let prize_amount = required("PRIZE_AMOUNT")?
            .parse::<u64>()
            .context("invalid PRIZE_AMOUNT")?;
        let currency = optional("CURRENCY").unwrap_or_else(|| "XOF".to_string());

        let winning_range = match (
            optional("CORRECT_ANSWER"),
            optional("CORRECT_MIN"),
            optional("CORRECT_MAX"),
        ) {
            (Some(answer), None, None) => {
                WinningRange::exact(answer.parse().context("invalid CORRECT_ANSWER")?)
            }
            (None, Some(min), Some(max)) => WinningRange::new(
                min.parse().context("invalid CORRECT_MIN")?,
                max.parse().context("invalid CORRECT_MAX")?,
            )?,
            _ => bail!("set either CORRECT_ANSWER or both CORRECT_MIN and CORRECT_MAX"),
        };

        let mut api_keys = HashMap::new();
        api_keys.insert(221, required("PAYOUT_API_KEY_SN")?);
        api_keys.insert(225, required("PAYOUT_API_KEY_CI")?);

        let conflict_is_win = match optional("TREAT_IDEMPOTENCY_CONFLICT_AS_WIN").as_deref() {
            None => false,
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            Some(other) => bail!("invalid TREAT_IDEMPOTENCY_CONFLICT_AS_WIN: {other}"),
        };

        let stream_poll_interval = Duration::from_millis(parse_u64_or("STREAM_POLL_MS", 750)?);

        Ok(Config {
            bind_addr,
            database_url,
            payout_api_url,
            payout_timeout,
            prize_amount,
            currency,
            winning_range,
            api_keys,
            conflict_is_win,
            stream_poll_interval,
        })
    }
}
