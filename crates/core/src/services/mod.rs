pub mod export_service;
pub mod feedback_service;
pub mod journal_service;
pub mod position_service;
pub mod price_service;
pub mod rate_limiter;
pub mod sizing_service;
pub mod stats_service;
pub mod valuation_service;
