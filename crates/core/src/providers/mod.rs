pub mod registry;
pub mod traits;

// Quote API implementations
pub mod alphavantage;
pub mod yahoo_finance;
