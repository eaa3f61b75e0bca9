//! Venue symbol codec
//!
//! Translates between [`CurrencyPair`] and a venue's symbol text. Venues
//! that concatenate assets without a delimiter (`ETHBTC`) are parsed with
//! the set of settlement assets seen in the venue's pair listing: the
//! longest matching suffix wins.

use crate::errors::{ExchangeError, Result};
use crate::types::CurrencyPair;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCase {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolOrder {
    /// `ETH_BTC`
    TradingFirst,
    /// `BTC_ETH`
    SettlementFirst,
}

/// How a venue spells a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolStyle {
    pub delimiter: Option<char>,
    pub case: SymbolCase,
    pub order: SymbolOrder,
}

impl SymbolStyle {
    pub const fn new(delimiter: Option<char>, case: SymbolCase, order: SymbolOrder) -> Self {
        Self { delimiter, case, order }
    }

    /// `ETHBTC`
    pub const fn concat_upper() -> Self {
        Self::new(None, SymbolCase::Upper, SymbolOrder::TradingFirst)
    }

    /// `ethbtc`
    pub const fn concat_lower() -> Self {
        Self::new(None, SymbolCase::Lower, SymbolOrder::TradingFirst)
    }

    pub const fn delimited(delimiter: char, case: SymbolCase) -> Self {
        Self::new(Some(delimiter), case, SymbolOrder::TradingFirst)
    }
}

/// Symbol formatter and parser for one venue
#[derive(Debug, Clone)]
pub struct SymbolCodec {
    style: SymbolStyle,
    // longest first
    settlements: Vec<String>,
}

impl SymbolCodec {
    pub fn new<I, S>(style: SymbolStyle, settlements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = settlements
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let mut settlements: Vec<String> = unique.into_iter().collect();
        settlements.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { style, settlements }
    }

    /// Codec whose settlement set is taken from a pair listing
    pub fn from_pairs(style: SymbolStyle, pairs: &[CurrencyPair]) -> Self {
        Self::new(style, pairs.iter().map(|p| p.settlement.as_str()))
    }

    pub fn style(&self) -> SymbolStyle {
        self.style
    }

    pub fn settlements(&self) -> &[String] {
        &self.settlements
    }

    /// Venue symbol for a pair
    pub fn format(&self, trading: &str, settlement: &str) -> String {
        let (first, second) = match self.style.order {
            SymbolOrder::TradingFirst => (trading, settlement),
            SymbolOrder::SettlementFirst => (settlement, trading),
        };
        let joined = match self.style.delimiter {
            Some(delimiter) => format!("{first}{delimiter}{second}"),
            None => format!("{first}{second}"),
        };
        match self.style.case {
            SymbolCase::Upper => joined.to_uppercase(),
            SymbolCase::Lower => joined.to_lowercase(),
        }
    }

    pub fn format_pair(&self, pair: &CurrencyPair) -> String {
        self.format(&pair.trading, &pair.settlement)
    }

    /// Pair for a venue symbol; `UnknownPair` when it cannot be split
    pub fn parse(&self, symbol: &str) -> Result<CurrencyPair> {
        let upper = symbol.trim().to_uppercase();
        let (first, second) = match self.style.delimiter {
            Some(delimiter) => upper
                .split_once(delimiter)
                .filter(|(_, b)| !b.contains(delimiter))
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .ok_or_else(|| ExchangeError::UnknownPair(symbol.to_string()))?,
            None => self.split_concatenated(&upper)?,
        };

        let (trading, settlement) = match self.style.order {
            SymbolOrder::TradingFirst => (first, second),
            SymbolOrder::SettlementFirst => (second, first),
        };
        CurrencyPair::new(&trading, &settlement)
            .map_err(|_| ExchangeError::UnknownPair(symbol.to_string()))
    }

    fn split_concatenated(&self, upper: &str) -> Result<(String, String)> {
        for settlement in &self.settlements {
            let split = match self.style.order {
                SymbolOrder::TradingFirst => upper
                    .strip_suffix(settlement.as_str())
                    .map(|rest| (rest.to_string(), settlement.clone())),
                SymbolOrder::SettlementFirst => upper
                    .strip_prefix(settlement.as_str())
                    .map(|rest| (settlement.clone(), rest.to_string())),
            };
            match split {
                Some((a, b)) if !a.is_empty() && !b.is_empty() => return Ok((a, b)),
                _ => continue,
            }
        }
        Err(ExchangeError::UnknownPair(upper.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_suffix_wins() {
        let codec = SymbolCodec::new(SymbolStyle::concat_upper(), ["BTC", "USD", "ETH", "USDT"]);
        assert_eq!(codec.parse("ETHBTC").unwrap(), CurrencyPair::new("ETH", "BTC").unwrap());
        assert_eq!(codec.parse("BTCUSDT").unwrap(), CurrencyPair::new("BTC", "USDT").unwrap());
        assert_eq!(codec.parse("btcusd").unwrap(), CurrencyPair::new("BTC", "USD").unwrap());
        assert_eq!(codec.settlements()[0], "USDT");
    }

    #[test]
    fn test_unknown_suffix() {
        let codec = SymbolCodec::new(SymbolStyle::concat_upper(), ["BTC"]);
        assert!(matches!(codec.parse("ETHJPY"), Err(ExchangeError::UnknownPair(_))));
        assert!(codec.parse("BTC").is_err());
    }

    #[test]
    fn test_delimited_styles() {
        let bitflyer = SymbolCodec::new(SymbolStyle::delimited('_', SymbolCase::Upper), Vec::<String>::new());
        assert_eq!(bitflyer.format("btc", "jpy"), "BTC_JPY");
        assert_eq!(bitflyer.parse("FX_BTC_JPY").unwrap_err().to_string(), "Unknown pair: FX_BTC_JPY");

        let kucoin = SymbolCodec::new(SymbolStyle::delimited('-', SymbolCase::Upper), Vec::<String>::new());
        assert_eq!(kucoin.parse("KCS-BTC").unwrap().trading, "KCS");

        let poloniex = SymbolCodec::new(
            SymbolStyle::new(Some('_'), SymbolCase::Upper, SymbolOrder::SettlementFirst),
            Vec::<String>::new(),
        );
        assert_eq!(poloniex.format("ETH", "BTC"), "BTC_ETH");
        assert_eq!(poloniex.parse("BTC_ETH").unwrap(), CurrencyPair::new("ETH", "BTC").unwrap());
    }

    #[test]
    fn test_lower_concat_round_trip() {
        let pairs = vec![
            CurrencyPair::new("ETH", "BTC").unwrap(),
            CurrencyPair::new("HT", "USDT").unwrap(),
        ];
        let codec = SymbolCodec::from_pairs(SymbolStyle::concat_lower(), &pairs);
        for pair in &pairs {
            let symbol = codec.format_pair(pair);
            assert_eq!(symbol, symbol.to_lowercase());
            assert_eq!(&codec.parse(&symbol).unwrap(), pair);
        }
    }
}
