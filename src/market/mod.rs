//! Market-side inputs: rate curves, day counting and option chain ingestion.

pub mod calendar;
pub mod quotes;
pub mod rates;

pub use calendar::year_fraction;
pub use quotes::{build_slices, maturity_from_symbol, parse_expiry, OptionQuote};
pub use rates::{FlatRate, RateCurve, RateProvider};
