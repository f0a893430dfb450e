//! Option chain ingestion: contract symbols to expiries, quotes to per-maturity slices.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use crate::calibration::types::Slice;
use crate::market::calendar::year_fraction;
use crate::market::rates::RateProvider;

/// One quoted option contract as delivered by a chain provider.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptionQuote {
    pub contract_symbol: String,
    pub strike: f64,
    pub implied_vol: f64,
    pub volume: Option<f64>,
}

/// Expiry date encoded in an OCC-style contract symbol such as `SPY240621C00500000`.
///
/// The six `yymmdd` digits follow the ticker, optionally after a weekly `W` marker.
pub fn parse_expiry(ticker: &str, symbol: &str) -> anyhow::Result<NaiveDate> {
    let rest = symbol.strip_prefix(ticker).unwrap_or(symbol);
    let rest = rest.strip_prefix('W').unwrap_or(rest);
    let digits = rest
        .get(..6)
        .with_context(|| format!("contract symbol {symbol} is too short for an expiry"))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("contract symbol {symbol} has no yymmdd expiry after ticker {ticker}");
    }
    NaiveDate::parse_from_str(digits, "%y%m%d")
        .with_context(|| format!("invalid expiry {digits} in contract symbol {symbol}"))
}

/// Year fraction from `today` to the end of the expiry day of `symbol`.
///
/// Fails for contracts that expired before `today`.
pub fn maturity_from_symbol(ticker: &str, symbol: &str, today: NaiveDate) -> anyhow::Result<f64> {
    let expiry = parse_expiry(ticker, symbol)?;
    if expiry < today {
        bail!("contract {symbol} expired on {expiry}, before {today}");
    }
    Ok(year_fraction(today, expiry + Duration::days(1)))
}

/// Groups a chain into maturity-sorted slices ready for calibration.
///
/// Quotes with a non-finite or non-positive vol are dropped, as are expiries that
/// have already passed. Log-moneyness is taken against the forward implied by
/// `spot`, `dividend_yield` and the rate at each maturity.
pub fn build_slices(
    ticker: &str,
    quotes: &[OptionQuote],
    spot: f64,
    dividend_yield: f64,
    rates: &dyn RateProvider,
    today: NaiveDate,
) -> anyhow::Result<Vec<Slice>> {
    if !(spot.is_finite() && spot > 0.0) {
        bail!("spot must be positive and finite, got {spot}");
    }

    let mut by_expiry: BTreeMap<NaiveDate, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    let mut dropped = 0usize;
    for quote in quotes {
        if !(quote.implied_vol.is_finite() && quote.implied_vol > 0.0)
            || !(quote.strike.is_finite() && quote.strike > 0.0)
        {
            dropped += 1;
            continue;
        }
        let expiry = parse_expiry(ticker, &quote.contract_symbol)?;
        let (strikes, vols) = by_expiry.entry(expiry).or_default();
        strikes.push(quote.strike);
        vols.push(quote.implied_vol);
    }
    if dropped > 0 {
        debug!(ticker, dropped, "dropped quotes without a usable implied vol");
    }

    let mut slices = Vec::with_capacity(by_expiry.len());
    for (expiry, (strikes, vols)) in by_expiry {
        if expiry < today {
            warn!(ticker, %expiry, "skipping expired contracts");
            continue;
        }
        let maturity = year_fraction(today, expiry + Duration::days(1));
        let slice = Slice::from_strikes(maturity, &strikes, vols, spot, dividend_yield, rates)
            .with_context(|| format!("building {ticker} slice for expiry {expiry}"))?;
        slices.push(slice);
    }
    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::rates::FlatRate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quote(symbol: &str, strike: f64, iv: f64) -> OptionQuote {
        OptionQuote {
            contract_symbol: symbol.to_string(),
            strike,
            implied_vol: iv,
            volume: Some(10.0),
        }
    }

    #[test]
    fn parses_standard_and_weekly_symbols() {
        assert_eq!(parse_expiry("SPY", "SPY240621C00500000").unwrap(), date(2024, 6, 21));
        assert_eq!(parse_expiry("SPX", "SPXW240105P04700000").unwrap(), date(2024, 1, 5));
    }

    #[test]
    fn rejects_malformed_symbols() {
        assert!(parse_expiry("SPY", "SPY24").is_err());
        assert!(parse_expiry("SPY", "SPYABCDEFC00500000").is_err());
        assert!(parse_expiry("SPY", "SPY241341C00500000").is_err());
    }

    #[test]
    fn maturity_counts_through_expiry_day() {
        let t = maturity_from_symbol("SPY", "SPY230110C00400000", date(2023, 1, 1)).unwrap();
        assert!((t - 10.0 / 365.0).abs() < 1e-15, "{t}");
        assert!(maturity_from_symbol("SPY", "SPY221230C00400000", date(2023, 1, 1)).is_err());
    }

    #[test]
    fn build_slices_groups_filters_and_sorts() {
        let quotes = vec![
            quote("SPY231215C00110000", 110.0, 0.21),
            quote("SPY230616C00090000", 90.0, 0.27),
            quote("SPY230616C00100000", 100.0, 0.22),
            quote("SPY230616C00105000", 105.0, f64::NAN),
            quote("SPY231215C00100000", 100.0, 0.20),
            quote("SPY230616C00110000", 110.0, 0.0),
        ];
        let slices =
            build_slices("SPY", &quotes, 100.0, 0.0, &FlatRate(0.0), date(2023, 1, 2)).unwrap();

        assert_eq!(slices.len(), 2);
        assert!(slices[0].maturity() < slices[1].maturity());
        assert_eq!(slices[0].len(), 2);
        assert_eq!(slices[1].len(), 2);
        assert_eq!(slices[0].implied_vols(), &[0.27, 0.22]);
        assert!((slices[0].log_moneyness()[1]).abs() < 1e-15);
    }

    #[test]
    fn expired_contracts_are_skipped() {
        let quotes = vec![
            quote("SPY230106C00100000", 100.0, 0.2),
            quote("SPY230616C00100000", 100.0, 0.2),
        ];
        let slices =
            build_slices("SPY", &quotes, 100.0, 0.0, &FlatRate(0.01), date(2023, 2, 1)).unwrap();
        assert_eq!(slices.len(), 1);
    }

    #[test]
    fn only_contracts_before_today_are_expired() {
        let quotes = vec![
            quote("SPY220617C00100000", 100.0, 0.2),
            quote("SPY230131C00100000", 100.0, 0.2),
            quote("SPY230201C00100000", 100.0, 0.2),
            quote("SPY230616C00100000", 100.0, 0.2),
        ];
        let slices =
            build_slices("SPY", &quotes, 100.0, 0.0, &FlatRate(0.01), date(2023, 2, 1)).unwrap();
        assert_eq!(slices.len(), 2);
        // Expiring today still has the expiry day left
        assert!((slices[0].maturity() - 1.0 / 365.0).abs() < 1e-15);
        assert!(slices.iter().all(|s| s.maturity() > 0.0));
    }

    #[test]
    fn bad_symbol_fails_the_chain() {
        let quotes = vec![quote("garbage", 100.0, 0.2)];
        let err = build_slices("SPY", &quotes, 100.0, 0.0, &FlatRate(0.0), date(2023, 1, 2));
        assert!(err.is_err());
    }
}
