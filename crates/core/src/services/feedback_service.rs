use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::analytics::{JournalStats, TradeMetrics};
use crate::models::trade::Trade;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_FEEDBACK_MODEL: &str = "gpt-4o-mini";
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

const SYSTEM_PROMPT: &str = "You are a trading coach reviewing a personal trading journal. \
Comment on execution, risk management and discipline. Be specific and brief. \
Do not give buy or sell recommendations.";

/// A language-model backend that turns a prompt into narrative text.
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI chat-completions backend.
pub struct OpenAiFeedbackProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiFeedbackProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_FEEDBACK_MODEL.to_string()),
            max_tokens: 500,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_once(&self, prompt: &str) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.4,
        };

        let response = self
            .client
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| feedback_error(format!("Unreadable completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| feedback_error("Completion had no content".into()))
    }
}

/// 429 is retryable; any other non-success status is a hard failure.
fn status_error(status: StatusCode, body: &str) -> CoreError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        CoreError::RateLimited("OpenAI".into())
    } else {
        feedback_error(format!("HTTP {status}: {body}"))
    }
}

/// Run `call` up to `MAX_ATTEMPTS` times, sleeping 1s then 2s between
/// attempts. Only network errors and rate limiting are retried.
async fn with_retries<F, Fut>(mut call: F) -> Result<String, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, CoreError>>,
{
    let mut delay = INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(text) => return Ok(text),
            Err(e @ (CoreError::Network(_) | CoreError::RateLimited(_))) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, max = MAX_ATTEMPTS, error = %e, "feedback request failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn feedback_error(message: String) -> CoreError {
    CoreError::Feedback {
        provider: "OpenAI".into(),
        message,
    }
}

#[async_trait]
impl FeedbackProvider for OpenAiFeedbackProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        with_retries(move || self.call_once(prompt)).await
    }
}

/// Narrative feedback on trades and on the journal as a whole.
///
/// Prompts are built deterministically from computed metrics, so the same
/// trade state yields the same prompt; completions are memoized per prompt.
pub struct FeedbackService {
    provider: Option<Box<dyn FeedbackProvider>>,
    cache: Mutex<HashMap<String, String>>,
}

impl FeedbackService {
    pub fn new(provider: Option<Box<dyn FeedbackProvider>>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// OpenAI-backed service when an `openai` key is present, otherwise disabled.
    pub fn from_api_keys(api_keys: &HashMap<String, String>, model: Option<String>) -> Self {
        let provider = api_keys
            .get("openai")
            .filter(|k| !k.is_empty())
            .map(|key| Box::new(OpenAiFeedbackProvider::new(key.clone(), model)) as Box<dyn FeedbackProvider>);
        Self::new(provider)
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub async fn trade_feedback(&self, trade: &Trade, metrics: &TradeMetrics) -> Result<String, CoreError> {
        self.ask(build_trade_prompt(trade, metrics)).await
    }

    pub async fn journal_feedback(&self, stats: &JournalStats) -> Result<String, CoreError> {
        self.ask(build_journal_prompt(stats)).await
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    async fn ask(&self, prompt: String) -> Result<String, CoreError> {
        let provider = self.provider.as_ref().ok_or(CoreError::FeedbackUnavailable)?;

        if let Some(cached) = self.cache.lock().get(&prompt) {
            return Ok(cached.clone());
        }

        tracing::info!(provider = provider.name(), prompt_chars = prompt.len(), "requesting narrative feedback");
        let text = provider.complete(&prompt).await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(CoreError::Feedback {
                provider: provider.name().to_string(),
                message: "Empty completion".into(),
            });
        }

        self.cache.lock().insert(prompt, text.clone());
        Ok(text)
    }
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}{suffix}"))
}

/// Prompt describing one trade: plan (stop/target), execution (exits), outcome.
pub fn build_trade_prompt(trade: &Trade, metrics: &TradeMetrics) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Review this trade from my journal.");
    let _ = writeln!(
        p,
        "{} {} x{} entered {} at {:.2} (fees {:.2}).",
        trade.side, trade.symbol, trade.quantity, trade.entry_date, trade.entry_price, trade.fees
    );
    let _ = writeln!(p, "Strategy: {}", trade.strategy.as_deref().unwrap_or("none recorded"));
    let _ = writeln!(p, "Stop-loss: {}; take-profit: {}", fmt_opt(trade.stop_loss, ""), fmt_opt(trade.take_profit, ""));
    let _ = writeln!(p, "Status: {}, remaining quantity {}", metrics.status, metrics.remaining_quantity);

    if metrics.exits.is_empty() {
        let _ = writeln!(p, "No exits yet.");
    } else {
        let _ = writeln!(p, "Exits:");
        for exit in &metrics.exits {
            let _ = writeln!(
                p,
                "- {}: {} at {:.2}, net P&L {:.2} ({:.2}%)",
                exit.date, exit.quantity, exit.price, exit.net_pnl, exit.return_pct
            );
        }
        let _ = writeln!(p, "Average exit price: {}", fmt_opt(metrics.average_exit_price, ""));
    }

    let _ = writeln!(
        p,
        "Realized P&L: {:.2}; return: {}; R multiple: {}; held {} days.",
        metrics.realized_pnl,
        fmt_opt(metrics.realized_return_pct, "%"),
        fmt_opt(metrics.r_multiple, "R"),
        metrics.holding_days
    );
    if let Some(unrealized) = metrics.unrealized_pnl {
        let _ = writeln!(p, "Unrealized P&L on the remainder: {unrealized:.2}");
    }
    if let Some(notes) = trade.notes.as_deref() {
        let _ = writeln!(p, "My notes: {notes}");
    }
    p
}

/// Prompt summarizing journal-wide statistics.
pub fn build_journal_prompt(stats: &JournalStats) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Review my trading journal statistics and point out patterns.");
    let _ = writeln!(
        p,
        "Trades: {} total ({} open, {} partial, {} closed).",
        stats.total_trades, stats.open_trades, stats.partial_trades, stats.closed_trades
    );
    let _ = writeln!(
        p,
        "Winners: {}, losers: {}, win rate {:.1}%.",
        stats.winners, stats.losers, stats.win_rate_pct
    );
    let _ = writeln!(
        p,
        "Net P&L {:.2}; gross profit {:.2}; gross loss {:.2}; profit factor {}.",
        stats.net_pnl,
        stats.gross_profit,
        stats.gross_loss,
        fmt_opt(stats.profit_factor, "")
    );
    let _ = writeln!(
        p,
        "Average win {:.2}, average loss {:.2}, expectancy {:.2}, average R {}.",
        stats.average_win,
        stats.average_loss,
        stats.expectancy,
        fmt_opt(stats.average_r_multiple, "R")
    );
    if !stats.by_strategy.is_empty() {
        let _ = writeln!(p, "By strategy:");
        for s in &stats.by_strategy {
            let _ = writeln!(
                p,
                "- {}: {} trades, win rate {:.1}%, net {:.2}",
                s.strategy, s.trades, s.win_rate_pct, s.net_pnl
            );
        }
    }
    p
}
