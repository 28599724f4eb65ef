use crate::errors::CoreError;
use crate::models::settings::Settings;
use crate::models::sizing::PositionSize;
use crate::models::trade::Trade;

/// Fixed-fractional position sizing: risk a set percent of the account
/// between entry and stop.
pub struct SizingService;

impl SizingService {
    pub fn new() -> Self {
        Self
    }

    /// Whole shares such that hitting the stop loses at most
    /// `risk_pct`% of `account_size`.
    pub fn position_size(
        &self,
        account_size: f64,
        risk_pct: f64,
        entry_price: f64,
        stop_price: f64,
    ) -> Result<PositionSize, CoreError> {
        for (field, value) in [
            ("Account size", account_size),
            ("Entry price", entry_price),
            ("Stop price", stop_price),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::ValidationError(format!("{field} must be positive (got {value})")));
            }
        }
        if !risk_pct.is_finite() || risk_pct <= 0.0 || risk_pct > 100.0 {
            return Err(CoreError::ValidationError(format!(
                "Risk percent must be in (0, 100] (got {risk_pct})"
            )));
        }

        let risk_per_share = (entry_price - stop_price).abs();
        if risk_per_share == 0.0 {
            return Err(CoreError::ValidationError("Stop price must differ from entry price".into()));
        }

        let risk_budget = account_size * risk_pct / 100.0;
        let shares = (risk_budget / risk_per_share).floor();
        let position_value = shares * entry_price;

        Ok(PositionSize {
            shares,
            risk_per_share,
            risk_budget,
            total_risk: shares * risk_per_share,
            position_value,
            pct_of_account: position_value / account_size * 100.0,
        })
    }

    /// Size a journaled trade from its entry and stop, using the account
    /// size and default risk percent from settings.
    pub fn size_for_trade(&self, settings: &Settings, trade: &Trade) -> Result<PositionSize, CoreError> {
        let account_size = settings
            .account_size
            .ok_or_else(|| CoreError::ValidationError("Account size is not set".into()))?;
        let stop = trade.stop_loss.ok_or_else(|| {
            CoreError::ValidationError(format!("Trade {} has no stop-loss", trade.symbol))
        })?;
        self.position_size(account_size, settings.default_risk_pct, trade.entry_price, stop)
    }
}

impl Default for SizingService {
    fn default() -> Self {
        Self::new()
    }
}
