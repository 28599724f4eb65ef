use std::collections::HashMap;

use super::alphavantage::AlphaVantageProvider;
use super::traits::QuoteProvider;
use super::yahoo_finance::YahooFinanceProvider;

/// Ordered list of quote providers. The first one is primary;
/// the rest are fallbacks tried when it fails.
pub struct QuoteProviderRegistry {
    providers: Vec<Box<dyn QuoteProvider>>,
}

impl QuoteProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registry with the built-in providers.
    /// Yahoo Finance needs no key; Alpha Vantage is added when
    /// an `alphavantage` key is present.
    pub fn new_with_defaults(api_keys: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        match YahooFinanceProvider::new() {
            Ok(yahoo) => registry.register(Box::new(yahoo)),
            Err(e) => tracing::warn!(error = %e, "Yahoo Finance provider unavailable"),
        }

        if let Some(key) = api_keys.get("alphavantage").filter(|k| !k.is_empty()) {
            registry.register(Box::new(AlphaVantageProvider::new(key.clone())));
        }

        registry
    }

    pub fn register(&mut self, provider: Box<dyn QuoteProvider>) {
        self.providers.push(provider);
    }

    /// Providers in priority order.
    pub fn providers(&self) -> Vec<&dyn QuoteProvider> {
        self.providers.iter().map(|p| p.as_ref()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }
}

impl Default for QuoteProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
