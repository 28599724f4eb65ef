use serde::{Deserialize, Serialize};

/// Result of a fixed-fractional position sizing calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    /// Whole shares to buy (or sell short)
    pub shares: f64,

    /// |entry − stop|
    pub risk_per_share: f64,

    /// Amount of the account the user is willing to lose
    pub risk_budget: f64,

    /// shares × risk per share (≤ risk budget)
    pub total_risk: f64,

    /// shares × entry price
    pub position_value: f64,

    /// position value / account size × 100
    pub pct_of_account: f64,
}
