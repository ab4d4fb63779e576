// Entry, target and stop placement from ATR

use common::config::LevelsConfig;
use common::{Direction, InputError, PriceLevels};
use rust_decimal::prelude::*;
use tracing::debug;

/// ATR-based levels, or fixed percentages when ATR is unusable or would put
/// the stop at or below zero
pub fn compute_levels(
    direction: Direction,
    entry: Decimal,
    atr: f64,
    config: &LevelsConfig,
) -> Result<PriceLevels, InputError> {
    if !direction.is_actionable() {
        return Err(InputError::NotActionable);
    }

    if atr.is_finite() && atr > 0.0 {
        let atr_levels = place(
            direction,
            entry,
            atr * config.target_atr_multiple,
            atr * config.stop_atr_multiple,
        );
        if atr_levels.validate(direction).is_ok() {
            return Ok(atr_levels);
        }
        debug!(
            "ATR {:.4} too wide for entry {}, using percentage levels",
            atr, entry
        );
    }

    let price = entry.to_f64().unwrap_or(0.0);
    let levels = place(
        direction,
        entry,
        price * config.fallback_target_pct / 100.0,
        price * config.fallback_stop_pct / 100.0,
    );
    levels.validate(direction)?;
    Ok(levels)
}

fn place(direction: Direction, entry: Decimal, reward: f64, risk: f64) -> PriceLevels {
    let reward = Decimal::from_f64(reward).unwrap_or(Decimal::ZERO).round_dp(4);
    let risk = Decimal::from_f64(risk).unwrap_or(Decimal::ZERO).round_dp(4);
    match direction {
        Direction::Bearish => PriceLevels {
            entry,
            target: entry - reward,
            stop_loss: entry + risk,
        },
        _ => PriceLevels {
            entry,
            target: entry + reward,
            stop_loss: entry - risk,
        },
    }
}
