pub mod analytics;
pub mod journal;
pub mod price;
pub mod purchase;
pub mod settings;
pub mod sizing;
pub mod trade;
