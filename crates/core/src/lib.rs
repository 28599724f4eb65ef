pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::NaiveDate;
use models::{
    analytics::{JournalStats, OpenPositionValuation, PortfolioValuation, TradeMetrics},
    journal::Journal,
    price::{PriceCache, PricePoint},
    purchase::StockPurchase,
    settings::{RateLimitSettings, Settings},
    sizing::PositionSize,
    trade::{Exit, Screenshot, Trade, TradeSortOrder, TradeStatus, TradeUpdate},
};
use providers::registry::QuoteProviderRegistry;
use services::{
    export_service::ExportService,
    feedback_service::{FeedbackProvider, FeedbackService},
    journal_service::JournalService,
    position_service::PositionService,
    price_service::PriceService,
    sizing_service::SizingService,
    stats_service::StatsService,
    valuation_service::ValuationService,
};
use std::collections::BTreeSet;
use storage::manager::StorageManager;
use uuid::Uuid;

use config::JournalConfig;
use errors::CoreError;

/// Main entry point for the trade journal core library.
/// Holds the journal state and all services needed to operate on it.
#[must_use]
pub struct TradeJournal {
    journal: Journal,
    journal_service: JournalService,
    positions: PositionService,
    price_service: PriceService,
    valuation_service: ValuationService,
    stats_service: StatsService,
    sizing_service: SizingService,
    feedback_service: FeedbackService,
    export_service: ExportService,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for TradeJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeJournal")
            .field("trades", &self.journal.trades.len())
            .field("purchases", &self.journal.purchases.len())
            .field("currency", &self.journal.settings.currency)
            .field("benchmark", &self.journal.settings.benchmark_symbol)
            .field("cached_prices", &self.journal.price_cache.total_entries())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl TradeJournal {
    /// Create a brand new empty journal with default settings.
    pub fn create_new() -> Self {
        Self::build(Journal::default())
    }

    /// Create a new journal with environment configuration applied
    /// (API keys, benchmark, quote rate limit).
    pub fn with_config(config: &JournalConfig) -> Self {
        let mut journal = Journal::default();
        config.apply_to(&mut journal.settings);
        Self::build(journal)
    }

    /// Apply environment configuration to an already loaded journal.
    pub fn apply_config(&mut self, config: &JournalConfig) {
        config.apply_to(&mut self.journal.settings);
        self.rebuild_services();
        self.dirty = true;
    }

    /// Load a journal from encrypted bytes (password required).
    pub fn load_from_bytes(encrypted: &[u8], password: &str) -> Result<Self, CoreError> {
        let journal = StorageManager::load_from_bytes(encrypted, password)?;
        tracing::info!(trades = journal.trades.len(), purchases = journal.purchases.len(), "journal loaded");
        Ok(Self::build(journal))
    }

    /// Save the journal to encrypted bytes.
    /// Clears the unsaved-changes flag on success.
    pub fn save_to_bytes(&mut self, password: &str) -> Result<Vec<u8>, CoreError> {
        let bytes = StorageManager::save_to_bytes(&self.journal, password)?;
        self.dirty = false;
        Ok(bytes)
    }

    pub fn load_from_file(path: &str, password: &str) -> Result<Self, CoreError> {
        let journal = StorageManager::load_from_file(path, password)?;
        tracing::info!(path, trades = journal.trades.len(), "journal loaded from file");
        Ok(Self::build(journal))
    }

    /// Save to an encrypted file on disk.
    /// Clears the unsaved-changes flag on success.
    pub fn save_to_file(&mut self, path: &str, password: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.journal, path, password)?;
        self.dirty = false;
        tracing::info!(path, "journal saved");
        Ok(())
    }

    // ── Trades ──────────────────────────────────────────────────────

    /// Add a trade (and any exits it already carries). Returns its id.
    pub fn add_trade(&mut self, trade: Trade) -> Result<Uuid, CoreError> {
        let id = trade.id;
        self.journal_service.add_trade(&mut self.journal, trade)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn update_trade(&mut self, trade_id: Uuid, update: TradeUpdate) -> Result<(), CoreError> {
        self.journal_service.update_trade(&mut self.journal, trade_id, update)?;
        self.dirty = true;
        Ok(())
    }

    /// Delete a trade permanently. See `remove_trade_to_trash` for undoable removal.
    pub fn remove_trade(&mut self, trade_id: Uuid) -> Result<Trade, CoreError> {
        let trade = self.journal_service.remove_trade(&mut self.journal, trade_id)?;
        self.dirty = true;
        Ok(trade)
    }

    pub fn set_trade_notes(&mut self, trade_id: Uuid, notes: Option<String>) -> Result<(), CoreError> {
        self.journal_service.set_trade_notes(&mut self.journal, trade_id, notes)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_trade_strategy(&mut self, trade_id: Uuid, strategy: Option<String>) -> Result<(), CoreError> {
        self.journal_service.set_strategy(&mut self.journal, trade_id, strategy)?;
        self.dirty = true;
        Ok(())
    }

    /// Attach a screenshot reference to a trade. Returns the screenshot id.
    pub fn add_screenshot(
        &mut self,
        trade_id: Uuid,
        url: impl Into<String>,
        caption: Option<String>,
    ) -> Result<Uuid, CoreError> {
        let screenshot = Screenshot::new(url, caption);
        let id = screenshot.id;
        self.journal_service.add_screenshot(&mut self.journal, trade_id, screenshot)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn remove_screenshot(&mut self, trade_id: Uuid, screenshot_id: Uuid) -> Result<Screenshot, CoreError> {
        let screenshot = self.journal_service.remove_screenshot(&mut self.journal, trade_id, screenshot_id)?;
        self.dirty = true;
        Ok(screenshot)
    }

    // ── Exits ───────────────────────────────────────────────────────

    /// Record a full or partial exit. Returns the exit id.
    pub fn add_exit(&mut self, trade_id: Uuid, exit: Exit) -> Result<Uuid, CoreError> {
        let id = exit.id;
        self.journal_service.add_exit(&mut self.journal, trade_id, exit)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn update_exit(
        &mut self,
        trade_id: Uuid,
        exit_id: Uuid,
        date: NaiveDate,
        price: f64,
        quantity: f64,
        fees: f64,
    ) -> Result<(), CoreError> {
        self.journal_service
            .update_exit(&mut self.journal, trade_id, exit_id, date, price, quantity, fees)?;
        self.dirty = true;
        Ok(())
    }

    pub fn remove_exit(&mut self, trade_id: Uuid, exit_id: Uuid) -> Result<Exit, CoreError> {
        let exit = self.journal_service.remove_exit(&mut self.journal, trade_id, exit_id)?;
        self.dirty = true;
        Ok(exit)
    }

    pub fn set_exit_notes(&mut self, trade_id: Uuid, exit_id: Uuid, notes: Option<String>) -> Result<(), CoreError> {
        let trade = self
            .journal
            .trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or_else(|| CoreError::TradeNotFound(trade_id.to_string()))?;
        self.positions.set_exit_notes(trade, exit_id, notes)?;
        self.dirty = true;
        Ok(())
    }

    // ── Purchases ───────────────────────────────────────────────────

    pub fn add_purchase(&mut self, purchase: StockPurchase) -> Result<Uuid, CoreError> {
        let id = purchase.id;
        self.journal_service.add_purchase(&mut self.journal, purchase)?;
        self.dirty = true;
        Ok(id)
    }

    /// Replace a purchase's fields; the id is kept.
    pub fn update_purchase(&mut self, purchase_id: Uuid, purchase: StockPurchase) -> Result<(), CoreError> {
        self.journal_service.update_purchase(&mut self.journal, purchase_id, purchase)?;
        self.dirty = true;
        Ok(())
    }

    pub fn remove_purchase(&mut self, purchase_id: Uuid) -> Result<StockPurchase, CoreError> {
        let purchase = self.journal_service.remove_purchase(&mut self.journal, purchase_id)?;
        self.dirty = true;
        Ok(purchase)
    }

    #[must_use]
    pub fn get_purchase(&self, purchase_id: Uuid) -> Option<&StockPurchase> {
        self.journal.purchases.iter().find(|p| p.id == purchase_id)
    }

    /// All purchases, oldest first.
    #[must_use]
    pub fn get_purchases(&self) -> &[StockPurchase] {
        &self.journal.purchases
    }

    #[must_use]
    pub fn get_purchases_for_symbol(&self, symbol: &str) -> Vec<&StockPurchase> {
        let symbol = symbol.trim().to_uppercase();
        self.journal.purchases.iter().filter(|p| p.symbol == symbol).collect()
    }

    // ── Queries ─────────────────────────────────────────────────────

    #[must_use]
    pub fn get_trade(&self, trade_id: Uuid) -> Option<&Trade> {
        self.journal.trades.iter().find(|t| t.id == trade_id)
    }

    /// All trades, oldest entry first.
    #[must_use]
    pub fn get_trades(&self) -> &[Trade] {
        &self.journal.trades
    }

    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.journal.trades.len()
    }

    #[must_use]
    pub fn get_trades_sorted(&self, order: &TradeSortOrder) -> Vec<&Trade> {
        let mut trades: Vec<&Trade> = self.journal.trades.iter().collect();
        match order {
            TradeSortOrder::EntryDateDesc => trades.sort_by(|a, b| b.entry_date.cmp(&a.entry_date)),
            TradeSortOrder::EntryDateAsc => trades.sort_by(|a, b| a.entry_date.cmp(&b.entry_date)),
            TradeSortOrder::SymbolAsc => trades.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
            TradeSortOrder::SymbolDesc => trades.sort_by(|a, b| b.symbol.cmp(&a.symbol)),
            TradeSortOrder::SizeDesc => trades.sort_by(|a, b| b.entry_value().total_cmp(&a.entry_value())),
        }
        trades
    }

    #[must_use]
    pub fn get_trades_for_symbol(&self, symbol: &str) -> Vec<&Trade> {
        let symbol = symbol.trim().to_uppercase();
        self.journal.trades.iter().filter(|t| t.symbol == symbol).collect()
    }

    #[must_use]
    pub fn get_trades_by_status(&self, status: TradeStatus) -> Vec<&Trade> {
        self.journal
            .trades
            .iter()
            .filter(|t| self.positions.status(t) == status)
            .collect()
    }

    /// Trades tagged with `strategy` (case-insensitive). `None` selects untagged trades.
    #[must_use]
    pub fn get_trades_by_strategy(&self, strategy: Option<&str>) -> Vec<&Trade> {
        self.journal
            .trades
            .iter()
            .filter(|t| match (strategy, t.strategy.as_deref()) {
                (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
                (None, None) => true,
                _ => false,
            })
            .collect()
    }

    /// Trades entered within `[from, to]` inclusive.
    #[must_use]
    pub fn get_trades_in_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Trade> {
        self.journal
            .trades
            .iter()
            .filter(|t| t.entry_date >= from && t.entry_date <= to)
            .collect()
    }

    /// Case-insensitive match against symbol, strategy, trade notes and exit notes.
    #[must_use]
    pub fn search_trades(&self, query: &str) -> Vec<&Trade> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return self.journal.trades.iter().collect();
        }
        let contains = |s: Option<&str>| s.is_some_and(|s| s.to_lowercase().contains(&q));
        self.journal
            .trades
            .iter()
            .filter(|t| {
                t.symbol.to_lowercase().contains(&q)
                    || contains(t.strategy.as_deref())
                    || contains(t.notes.as_deref())
                    || t.exits.iter().any(|e| contains(e.notes.as_deref()))
            })
            .collect()
    }

    /// Distinct strategy tags in use, sorted.
    #[must_use]
    pub fn get_strategies(&self) -> Vec<String> {
        self.journal
            .trades
            .iter()
            .filter_map(|t| t.strategy.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Every symbol that appears in a trade or a purchase, sorted.
    #[must_use]
    pub fn get_symbols(&self) -> Vec<String> {
        self.journal
            .trades
            .iter()
            .map(|t| t.symbol.clone())
            .chain(self.journal.purchases.iter().map(|p| p.symbol.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // ── Undo (Trash) ────────────────────────────────────────────────

    /// Remove a trade and keep it in the trash for potential undo.
    pub fn remove_trade_to_trash(&mut self, trade_id: Uuid) -> Result<Trade, CoreError> {
        let trade = self.journal_service.remove_trade(&mut self.journal, trade_id)?;
        self.journal.trash.push(trade.clone());
        self.dirty = true;
        Ok(trade)
    }

    /// Restore the most recently trashed trade.
    /// Returns the restored trade, or `None` if the trash is empty.
    pub fn undo_last_removal(&mut self) -> Result<Option<Trade>, CoreError> {
        let trade = match self.journal.trash.pop() {
            Some(t) => t,
            None => return Ok(None),
        };

        if let Err(e) = self.journal_service.add_trade(&mut self.journal, trade.clone()) {
            self.journal.trash.push(trade);
            return Err(e);
        }
        self.dirty = true;
        Ok(Some(trade))
    }

    #[must_use]
    pub fn get_trash(&self) -> &[Trade] {
        &self.journal.trash
    }

    pub fn clear_trash(&mut self) {
        if !self.journal.trash.is_empty() {
            self.journal.trash.clear();
            self.dirty = true;
        }
    }

    // ── Analysis ────────────────────────────────────────────────────

    /// Metrics for one trade. With `current_price`, the remaining quantity
    /// is marked to market; holding days for open trades run to `as_of`.
    pub fn trade_metrics(
        &self,
        trade_id: Uuid,
        current_price: Option<f64>,
        as_of: NaiveDate,
    ) -> Result<TradeMetrics, CoreError> {
        let trade = self.trade(trade_id)?;
        Ok(self.positions.metrics(trade, current_price, as_of))
    }

    /// Metrics with the remaining quantity marked at the latest quote.
    /// Closed trades need no quote.
    pub async fn trade_metrics_at_market(&mut self, trade_id: Uuid, as_of: NaiveDate) -> Result<TradeMetrics, CoreError> {
        let trade = self.trade(trade_id)?;
        let symbol = trade.symbol.clone();
        let current_price = if self.positions.status(trade) == TradeStatus::Closed {
            None
        } else {
            Some(self.fetch_or_cached(&symbol, as_of).await?)
        };
        self.trade_metrics(trade_id, current_price, as_of)
    }

    /// Value the purchase portfolio on `as_of`, compared against the benchmark.
    pub async fn value_portfolio(&mut self, as_of: NaiveDate) -> Result<PortfolioValuation, CoreError> {
        let before = self.journal.price_cache.revision();
        let mut cache = std::mem::take(&mut self.journal.price_cache);
        let result = self
            .valuation_service
            .value_portfolio(&self.journal, &self.price_service, &mut cache, as_of)
            .await;
        self.restore_cache(cache, before);
        result
    }

    /// Mark open and partially exited trades to market on `as_of`.
    pub async fn value_open_positions(&mut self, as_of: NaiveDate) -> Vec<OpenPositionValuation> {
        let before = self.journal.price_cache.revision();
        let mut cache = std::mem::take(&mut self.journal.price_cache);
        let open = self
            .valuation_service
            .value_open_positions(&self.journal, &self.price_service, &mut cache, as_of)
            .await;
        self.restore_cache(cache, before);
        open
    }

    #[must_use]
    pub fn journal_stats(&self) -> JournalStats {
        self.stats_service.compute(&self.journal.trades)
    }

    /// Stats over trades entered within `[from, to]`.
    #[must_use]
    pub fn journal_stats_in_range(&self, from: NaiveDate, to: NaiveDate) -> JournalStats {
        let trades: Vec<Trade> = self.get_trades_in_range(from, to).into_iter().cloned().collect();
        self.stats_service.compute(&trades)
    }

    // ── Position Sizing ─────────────────────────────────────────────

    pub fn position_size(
        &self,
        account_size: f64,
        risk_pct: f64,
        entry_price: f64,
        stop_price: f64,
    ) -> Result<PositionSize, CoreError> {
        self.sizing_service.position_size(account_size, risk_pct, entry_price, stop_price)
    }

    /// Size using the account size and risk percent from settings.
    pub fn position_size_from_settings(&self, entry_price: f64, stop_price: f64) -> Result<PositionSize, CoreError> {
        let account_size = self
            .journal
            .settings
            .account_size
            .ok_or_else(|| CoreError::ValidationError("Account size is not set".into()))?;
        self.sizing_service
            .position_size(account_size, self.journal.settings.default_risk_pct, entry_price, stop_price)
    }

    pub fn size_for_trade(&self, trade_id: Uuid) -> Result<PositionSize, CoreError> {
        let trade = self.trade(trade_id)?;
        self.sizing_service.size_for_trade(&self.journal.settings, trade)
    }

    // ── Narrative Feedback ──────────────────────────────────────────

    #[must_use]
    pub fn is_feedback_available(&self) -> bool {
        self.feedback_service.is_available()
    }

    /// Coaching commentary on one trade. Open remainders are marked at the
    /// latest cached quote, if any.
    pub async fn trade_feedback(&self, trade_id: Uuid, as_of: NaiveDate) -> Result<String, CoreError> {
        let trade = self.trade(trade_id)?;
        let cached_price = self
            .journal
            .price_cache
            .get_price_on_or_before(&trade.symbol, as_of)
            .map(|p| p.price);
        let metrics = self.positions.metrics(trade, cached_price, as_of);
        self.feedback_service.trade_feedback(trade, &metrics).await
    }

    /// Coaching commentary on the journal-wide statistics.
    pub async fn journal_feedback(&self) -> Result<String, CoreError> {
        let stats = self.journal_stats();
        self.feedback_service.journal_feedback(&stats).await
    }

    /// Replace the feedback backend (e.g. with a local model or a test double).
    pub fn set_feedback_provider(&mut self, provider: Box<dyn FeedbackProvider>) {
        self.feedback_service = FeedbackService::new(Some(provider));
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Price of `symbol` on `date`. Uses the cache first, then the providers.
    pub async fn get_price(&mut self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let before = self.journal.price_cache.revision();
        let price = self
            .price_service
            .get_price(&mut self.journal.price_cache, &symbol, date)
            .await?;
        self.mark_if_cache_changed(before);
        Ok(price)
    }

    pub async fn get_price_range(
        &mut self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let before = self.journal.price_cache.revision();
        let points = self
            .price_service
            .get_price_range(&mut self.journal.price_cache, &symbol, from, to)
            .await?;
        self.mark_if_cache_changed(before);
        Ok(points)
    }

    /// Fetch today's quote for every open trade, held purchase and the
    /// benchmark. Failures are logged and skipped; returns how many
    /// symbols were refreshed.
    pub async fn refresh_prices(&mut self) -> Result<usize, CoreError> {
        if !self.price_service.has_providers() {
            return Err(CoreError::NoProvider);
        }
        let today = chrono::Utc::now().date_naive();

        let mut symbols: BTreeSet<String> = self
            .journal
            .trades
            .iter()
            .filter(|t| self.positions.status(t) != TradeStatus::Closed)
            .map(|t| t.symbol.clone())
            .collect();
        symbols.extend(self.journal.purchases.iter().map(|p| p.symbol.clone()));
        symbols.insert(self.journal.settings.benchmark_symbol.clone());

        let before = self.journal.price_cache.revision();
        let mut refreshed = 0;
        for symbol in &symbols {
            match self.price_service.get_price(&mut self.journal.price_cache, symbol, today).await {
                Ok(_) => refreshed += 1,
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "price refresh failed"),
            }
        }
        self.mark_if_cache_changed(before);
        tracing::info!(refreshed, total = symbols.len(), "prices refreshed");
        Ok(refreshed)
    }

    /// Replace the quote providers (e.g. with a custom source or a test double).
    /// The configured rate limit still applies.
    pub fn set_quote_registry(&mut self, registry: QuoteProviderRegistry) {
        self.price_service = PriceService::with_rate_limit(registry, &self.journal.settings.quote_rate_limit);
    }

    #[must_use]
    pub fn has_quote_provider(&self) -> bool {
        self.price_service.has_providers()
    }

    #[must_use]
    pub fn quote_provider_names(&self) -> Vec<String> {
        self.price_service.provider_names()
    }

    // ── Cache Management ────────────────────────────────────────────

    #[must_use]
    pub fn cache_total_entries(&self) -> usize {
        self.journal.price_cache.total_entries()
    }

    #[must_use]
    pub fn cache_symbol_count(&self) -> usize {
        self.journal.price_cache.symbol_count()
    }

    /// Remove cached prices older than `before`. Returns the number removed.
    pub fn cache_prune_before(&mut self, before: NaiveDate) -> usize {
        let removed = self.journal.price_cache.prune_before(before);
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn cache_clear(&mut self) {
        self.journal.price_cache.clear();
        self.dirty = true;
    }

    #[must_use]
    pub fn get_cached_price(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.journal.price_cache.get_price(symbol, date)
    }

    /// Manually insert a price (offline use, historical import).
    pub fn set_cached_price(&mut self, symbol: &str, date: NaiveDate, price: f64) -> Result<(), CoreError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::ValidationError(format!("Price must be positive (got {price})")));
        }
        self.journal.price_cache.set_price(symbol, date, price);
        self.dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn get_last_refreshed(&self, symbol: &str) -> Option<NaiveDate> {
        self.journal.price_cache.last_updated.get(&symbol.to_uppercase()).copied()
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.journal.settings
    }

    /// Set the display currency label. Must be 3 ASCII letters.
    pub fn set_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        let code = currency.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::ValidationError(format!(
                "Invalid currency code '{currency}': must be exactly 3 ASCII letters (e.g., USD, EUR)"
            )));
        }
        self.journal.settings.currency = code;
        self.dirty = true;
        Ok(())
    }

    pub fn set_benchmark_symbol(&mut self, symbol: &str) -> Result<(), CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(CoreError::ValidationError("Benchmark symbol must not be empty".into()));
        }
        self.journal.settings.benchmark_symbol = symbol;
        self.dirty = true;
        Ok(())
    }

    /// Set an API key ("alphavantage", "openai").
    /// Rebuilds the providers so the key takes effect immediately.
    pub fn set_api_key(&mut self, provider: &str, key: String) {
        self.journal.settings.api_keys.insert(provider.to_lowercase(), key);
        self.rebuild_services();
        self.dirty = true;
    }

    pub fn remove_api_key(&mut self, provider: &str) -> bool {
        let removed = self.journal.settings.api_keys.remove(&provider.to_lowercase()).is_some();
        if removed {
            self.rebuild_services();
            self.dirty = true;
        }
        removed
    }

    pub fn set_quote_rate_limit(&mut self, limits: RateLimitSettings) -> Result<(), CoreError> {
        if limits.max_concurrent == 0 || limits.requests_per_minute == 0 {
            return Err(CoreError::ValidationError(
                "Rate limit values must be greater than zero".into(),
            ));
        }
        self.journal.settings.quote_rate_limit = limits;
        let registry = QuoteProviderRegistry::new_with_defaults(&self.journal.settings.api_keys);
        self.price_service = PriceService::with_rate_limit(registry, &limits);
        self.dirty = true;
        Ok(())
    }

    pub fn set_account_size(&mut self, account_size: Option<f64>) -> Result<(), CoreError> {
        if let Some(size) = account_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(CoreError::ValidationError(format!("Account size must be positive (got {size})")));
            }
        }
        self.journal.settings.account_size = account_size;
        self.dirty = true;
        Ok(())
    }

    pub fn set_default_risk_pct(&mut self, risk_pct: f64) -> Result<(), CoreError> {
        if !risk_pct.is_finite() || risk_pct <= 0.0 || risk_pct > 100.0 {
            return Err(CoreError::ValidationError(format!(
                "Risk percent must be in (0, 100] (got {risk_pct})"
            )));
        }
        self.journal.settings.default_risk_pct = risk_pct;
        self.dirty = true;
        Ok(())
    }

    pub fn set_feedback_model(&mut self, model: Option<String>) {
        self.journal.settings.feedback_model = model.filter(|m| !m.trim().is_empty());
        self.feedback_service = FeedbackService::from_api_keys(
            &self.journal.settings.api_keys,
            self.journal.settings.feedback_model.clone(),
        );
        self.dirty = true;
    }

    // ── Password & Dirty State ──────────────────────────────────────

    /// Re-encrypt the journal with a new password.
    ///
    /// `last_saved_bytes` must be the most recently saved encrypted bytes;
    /// the current password is verified by decrypting them.
    pub fn change_password(
        &mut self,
        last_saved_bytes: &[u8],
        current_password: &str,
        new_password: &str,
    ) -> Result<Vec<u8>, CoreError> {
        StorageManager::load_from_bytes(last_saved_bytes, current_password)?;

        let new_bytes = StorageManager::save_to_bytes(&self.journal, new_password)?;
        self.dirty = false;
        Ok(new_bytes)
    }

    /// Returns `true` if the journal has been modified since the last save or load.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    // ── Export / Import ─────────────────────────────────────────────

    pub fn export_trades_to_csv(&self) -> Result<String, CoreError> {
        self.export_service.trades_to_csv(&self.journal.trades)
    }

    pub fn export_exits_to_csv(&self) -> Result<String, CoreError> {
        self.export_service.exits_to_csv(&self.journal.trades)
    }

    pub fn export_purchases_to_csv(&self) -> Result<String, CoreError> {
        self.export_service.purchases_to_csv(&self.journal.purchases)
    }

    pub fn export_trades_to_json(&self) -> Result<String, CoreError> {
        self.export_service.trades_to_json(&self.journal.trades)
    }

    pub fn export_purchases_to_json(&self) -> Result<String, CoreError> {
        self.export_service.purchases_to_json(&self.journal.purchases)
    }

    /// Import purchases from CSV. Every row is validated before any is
    /// added; returns the number imported.
    pub fn import_purchases_from_csv(&mut self, data: &str) -> Result<usize, CoreError> {
        let purchases = self.export_service.purchases_from_csv(data)?;
        self.import_purchases(purchases)
    }

    pub fn import_purchases_from_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let purchases = self.export_service.purchases_from_json(json)?;
        self.import_purchases(purchases)
    }

    /// Import trades (with their exits) from JSON. All or nothing.
    pub fn import_trades_from_json(&mut self, json: &str) -> Result<usize, CoreError> {
        let trades = self.export_service.trades_from_json(json)?;
        let count = trades.len();

        let mut staged = Journal {
            trades: self.journal.trades.clone(),
            ..Journal::default()
        };
        for trade in trades {
            self.journal_service.add_trade(&mut staged, trade)?;
        }

        self.journal.trades = staged.trades;
        if count > 0 {
            self.dirty = true;
        }
        Ok(count)
    }

    /// Unencrypted snapshot of the whole journal, for debugging or display.
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&self.journal)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize journal: {e}")))
    }

    // ── Internal ────────────────────────────────────────────────────

    fn build(journal: Journal) -> Self {
        let settings = &journal.settings;
        let registry = QuoteProviderRegistry::new_with_defaults(&settings.api_keys);
        let price_service = PriceService::with_rate_limit(registry, &settings.quote_rate_limit);
        let feedback_service = FeedbackService::from_api_keys(&settings.api_keys, settings.feedback_model.clone());

        Self {
            journal,
            journal_service: JournalService::new(),
            positions: PositionService::new(),
            price_service,
            valuation_service: ValuationService::new(),
            stats_service: StatsService::new(),
            sizing_service: SizingService::new(),
            feedback_service,
            export_service: ExportService::new(),
            dirty: false,
        }
    }

    fn rebuild_services(&mut self) {
        let settings = &self.journal.settings;
        let registry = QuoteProviderRegistry::new_with_defaults(&settings.api_keys);
        self.price_service = PriceService::with_rate_limit(registry, &settings.quote_rate_limit);
        self.feedback_service = FeedbackService::from_api_keys(&settings.api_keys, settings.feedback_model.clone());
    }

    fn trade(&self, trade_id: Uuid) -> Result<&Trade, CoreError> {
        self.get_trade(trade_id)
            .ok_or_else(|| CoreError::TradeNotFound(trade_id.to_string()))
    }

    async fn fetch_or_cached(&mut self, symbol: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let before = self.journal.price_cache.revision();
        let price = self
            .price_service
            .get_price_or_cached(&mut self.journal.price_cache, symbol, date)
            .await?;
        self.mark_if_cache_changed(before);
        Ok(price)
    }

    fn import_purchases(&mut self, purchases: Vec<StockPurchase>) -> Result<usize, CoreError> {
        let count = purchases.len();
        let mut staged = Journal {
            purchases: self.journal.purchases.clone(),
            ..Journal::default()
        };
        for purchase in purchases {
            self.journal_service.add_purchase(&mut staged, purchase)?;
        }

        self.journal.purchases = staged.purchases;
        if count > 0 {
            self.dirty = true;
        }
        Ok(count)
    }

    fn restore_cache(&mut self, cache: PriceCache, before: u64) {
        self.journal.price_cache = cache;
        self.mark_if_cache_changed(before);
    }

    /// Quotes and refresh markers are persisted with the journal, so any
    /// cache mutation is an unsaved change.
    fn mark_if_cache_changed(&mut self, revision_before: u64) {
        if self.journal.price_cache.revision() != revision_before {
            self.dirty = true;
        }
    }
}
