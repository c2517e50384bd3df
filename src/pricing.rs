// Weekly price returns for live scoring.

use anyhow::Result;
use tracing::debug;

use crate::db::Database;
use crate::periods::{base_week, iso_week_bounds};

/// Percentage return for `symbol` across the trading days of `week`.
///
/// Takes the first row's open and the last row's close inside the week's
/// Monday..Sunday bounds, falling back to the other side of the candle when
/// one is missing. Anything unusable scores 0.0: no rows, no prices on the
/// boundary rows, a zero open, or a label with no ISO week in it. Playoff
/// and round-robin labels price against their base week.
pub fn week_return_pct(db: &Database, symbol: &str, week: &str) -> Result<f64> {
    let (start, end) = match iso_week_bounds(base_week(week)) {
        Ok(bounds) => bounds,
        Err(err) => {
            debug!("no price window for week '{week}': {err}");
            return Ok(0.0);
        }
    };

    let rows = db.prices_in_range(symbol, start, end)?;
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(0.0);
    };

    let first_open = first.open.or(first.close);
    let last_close = last.close.or(last.open);
    match (first_open, last_close) {
        (Some(open), Some(close)) if open != 0.0 => Ok(((close - open) / open) * 100.0),
        _ => Ok(0.0),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
