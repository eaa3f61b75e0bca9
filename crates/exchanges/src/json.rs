//! JSON extraction helpers and declarative schemas
//!
//! Venues disagree on whether numbers arrive as JSON numbers or strings, and
//! on where ticker and book fields live. Adapters describe their layout with
//! a [`TickerSchema`] or [`BookSchema`] made of JSON pointers; one routine
//! per schema does the walking.

use crate::errors::{ExchangeError, Result};
use crate::types::Board;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use unifex_core::Fixed;

/// Number or numeric string
pub fn num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Typed view of a reply; a shape mismatch is a `SchemaMismatch`
pub fn typed<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ExchangeError::schema(e.to_string()))
}

/// serde `deserialize_with` for numbers sent as JSON numbers or strings
pub fn flexible_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    num(&value).ok_or_else(|| D::Error::custom(format!("expected number, got {value}")))
}

/// Required number at a JSON pointer
pub fn f64_at(value: &Value, pointer: &str) -> Result<f64> {
    value
        .pointer(pointer)
        .and_then(num)
        .ok_or_else(|| ExchangeError::schema(format!("expected number at {pointer}")))
}

/// Optional number at a JSON pointer
pub fn opt_f64_at(value: &Value, pointer: &str) -> Option<f64> {
    value.pointer(pointer).and_then(num)
}

/// Required string at a JSON pointer
pub fn str_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ExchangeError::schema(format!("expected string at {pointer}")))
}

/// Required array at a JSON pointer (`""` for the root)
pub fn array_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a Vec<Value>> {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| ExchangeError::schema(format!("expected array at {pointer:?}")))
}

/// Boolean that may be sent as `true`, `1` or `"true"`
pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Order ids arrive as strings or integers
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Required order id at a JSON pointer
pub fn id_at(value: &Value, pointer: &str) -> Result<String> {
    value
        .pointer(pointer)
        .and_then(id_string)
        .ok_or_else(|| ExchangeError::schema(format!("expected order id at {pointer}")))
}

/// Decimal count from either an integer precision (`8`) or a step size
/// (`"0.00100000"` gives 3)
pub fn decimals(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(places) => u32::try_from(places).ok(),
            None => Fixed::step_decimals(&n.to_string()).ok(),
        },
        Value::String(s) => match s.parse::<u32>() {
            Ok(places) if !s.contains('.') => Some(places),
            _ => Fixed::step_decimals(s).ok(),
        },
        _ => None,
    }
}

/// Book levels as `(price, amount)`: `[[p, a, ..], ..]` or
/// `[{"price": p, "amount"|"quantity"|"size"|"volume": a}, ..]`
pub fn levels(value: Option<&Value>) -> Vec<(f64, f64)> {
    let Some(rows) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match row {
            Value::Array(cells) => Some((num(cells.first()?)?, num(cells.get(1)?)?)),
            Value::Object(fields) => {
                let price = num(fields.get("price")?)?;
                let amount = ["amount", "quantity", "size", "volume", "size_float"]
                    .iter()
                    .find_map(|k| fields.get(*k).and_then(num))?;
                Some((price, amount))
            }
            _ => None,
        })
        .collect()
}

/// Where ticker rows live
#[derive(Debug, Clone, Copy)]
pub enum Rows {
    /// Array of row objects at the pointer
    Array(&'static str),
    /// Object keyed by symbol at the pointer
    Keyed(&'static str),
}

/// Where a row's symbol comes from
#[derive(Debug, Clone, Copy)]
pub enum SymbolSource {
    Field(&'static str),
    Key,
}

/// Layout of a bulk ticker reply
#[derive(Debug, Clone, Copy)]
pub struct TickerSchema {
    pub rows: Rows,
    pub symbol: SymbolSource,
    pub last: &'static str,
    pub volume: Option<&'static str>,
    pub bid: Option<&'static str>,
    pub ask: Option<&'static str>,
}

/// One ticker row, symbol still in venue form
#[derive(Debug, Clone, PartialEq)]
pub struct TickerRow {
    pub symbol: String,
    pub last: f64,
    pub volume: f64,
    pub bid: f64,
    pub ask: f64,
}

impl TickerSchema {
    /// Rows without a symbol or last price are skipped
    pub fn extract(&self, value: &Value) -> Result<Vec<TickerRow>> {
        let entries: Vec<(Option<String>, &Value)> = match self.rows {
            Rows::Array(pointer) => array_at(value, pointer)?
                .iter()
                .map(|row| (None, row))
                .collect(),
            Rows::Keyed(pointer) => value
                .pointer(pointer)
                .and_then(Value::as_object)
                .ok_or_else(|| ExchangeError::schema(format!("expected object at {pointer:?}")))?
                .iter()
                .map(|(key, row)| (Some(key.clone()), row))
                .collect(),
        };

        let mut rows = Vec::with_capacity(entries.len());
        for (key, row) in entries {
            let symbol = match (self.symbol, key) {
                (SymbolSource::Key, Some(key)) => Some(key),
                (SymbolSource::Field(pointer), _) => row.pointer(pointer).and_then(id_string),
                (SymbolSource::Key, None) => None,
            };
            let Some(symbol) = symbol else {
                warn!("ticker row without symbol skipped");
                continue;
            };
            match self.row(symbol, row) {
                Some(parsed) => rows.push(parsed),
                None => continue,
            }
        }
        Ok(rows)
    }

    /// One row from a single-symbol reply
    pub fn extract_one(&self, symbol: &str, row: &Value) -> Result<TickerRow> {
        self.row(symbol.to_string(), row)
            .ok_or_else(|| ExchangeError::schema(format!("ticker for {symbol} lacks {}", self.last)))
    }

    fn row(&self, symbol: String, row: &Value) -> Option<TickerRow> {
        let last = opt_f64_at(row, self.last)?;
        let pick = |pointer: Option<&'static str>| pointer.and_then(|p| opt_f64_at(row, p)).unwrap_or(0.0);
        Some(TickerRow {
            symbol,
            last,
            volume: pick(self.volume),
            bid: pick(self.bid),
            ask: pick(self.ask),
        })
    }
}

/// Layout of an order-book reply
#[derive(Debug, Clone, Copy)]
pub struct BookSchema {
    pub asks: &'static str,
    pub bids: &'static str,
}

impl BookSchema {
    pub fn extract(&self, value: &Value) -> Board {
        Board::from_levels(levels(value.pointer(self.asks)), levels(value.pointer(self.bids)))
    }
}
