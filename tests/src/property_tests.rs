//! Property-based tests for order-field formatting and symbol codecs

use proptest::prelude::*;
use unifex_core::floor_format;
use unifex_exchanges::symbol::{SymbolCase, SymbolCodec, SymbolOrder, SymbolStyle};
use unifex_exchanges::CurrencyPair;

fn asset() -> impl Strategy<Value = String> {
    "[A-Z]{2,5}"
}

proptest! {
    #[test]
    fn floor_format_never_rounds_up(value in 0.0f64..1_000_000.0, precision in 0u32..=8) {
        let text = floor_format(value, precision).unwrap();
        let parsed: f64 = text.parse().unwrap();
        prop_assert!(parsed <= value + 1e-9);
        prop_assert!(value - parsed < 10f64.powi(-(precision as i32)) + 1e-9);
    }

    #[test]
    fn floor_format_has_exact_decimals(value in 0.0f64..1_000.0, precision in 0u32..=8) {
        let text = floor_format(value, precision).unwrap();
        match text.split_once('.') {
            Some((_, decimals)) => prop_assert_eq!(decimals.len() as u32, precision),
            None => prop_assert_eq!(precision, 0),
        }
    }

    #[test]
    fn delimited_codec_round_trips(
        trading in asset(),
        settlement in asset(),
        delimiter in prop::sample::select(vec!['_', '-', '/']),
        lower in any::<bool>(),
        settlement_first in any::<bool>(),
    ) {
        prop_assume!(trading != settlement);
        let case = if lower { SymbolCase::Lower } else { SymbolCase::Upper };
        let order = if settlement_first { SymbolOrder::SettlementFirst } else { SymbolOrder::TradingFirst };
        let codec = SymbolCodec::new(SymbolStyle::new(Some(delimiter), case, order), Vec::<String>::new());

        let pair = CurrencyPair::new(&trading, &settlement).unwrap();
        let symbol = codec.format_pair(&pair);
        prop_assert_eq!(codec.parse(&symbol).unwrap(), pair);
    }

    #[test]
    fn concatenated_codec_splits_on_known_settlement(
        trading in asset(),
        settlement in prop::sample::select(vec!["BTC", "ETH", "USDT", "USD"]),
    ) {
        // a trading asset ending in a settlement code is ambiguous by construction
        prop_assume!(!["BTC", "ETH", "USDT", "USD"].iter().any(|s| trading.ends_with(s) || trading == *s));
        let codec = SymbolCodec::new(SymbolStyle::concat_upper(), ["BTC", "ETH", "USDT", "USD"]);
        let pair = CurrencyPair::new(&trading, settlement).unwrap();
        prop_assert_eq!(codec.parse(&codec.format_pair(&pair)).unwrap(), pair);
    }
}
