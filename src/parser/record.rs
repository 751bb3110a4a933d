//! Second pass: strict decoding of a token stream into a `YearEntry`.

use serde::Deserialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::plan::YearEntry;
use super::tokenizer::{tokenize, Token, TokenKind};

/// Revenue key spellings, highest priority first
pub const REVENUE_KEYS: [&str; 3] = ["Revenue (INR)", "Revenue (Rs.)", "Revenue"];

/// Deepest container nesting a record may use. Real records need two levels.
pub const MAX_DEPTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("unexpected character '{ch}' at column {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at column {offset}")]
    UnterminatedString { offset: usize },

    #[error("unexpected {found} at column {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("record ended unexpectedly")]
    UnexpectedEnd,

    #[error("invalid number '{0}'")]
    BadNumber(String),

    #[error("unknown identifier '{0}'")]
    UnknownIdent(String),

    #[error("record nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("record is not a key/value mapping")]
    NotAMapping,

    #[error("invalid record fields: {0}")]
    Fields(String),

    #[error("missing revenue (expected one of {})", REVENUE_KEYS.join(", "))]
    MissingRevenue,

    #[error("field '{field}' {problem}")]
    OutOfRange { field: &'static str, problem: &'static str },
}

/// Decode one record line (already known to start with `{`).
pub fn decode_record(line: &str) -> Result<YearEntry, RecordError> {
    let tokens = tokenize(line)?;
    let value = Decoder::new(&tokens).document()?;
    let Value::Object(map) = value else {
        return Err(RecordError::NotAMapping);
    };
    year_entry(map)
}

struct Decoder<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// A single value that must consume every token
    fn document(mut self) -> Result<Value, RecordError> {
        let value = self.value()?;
        match self.tokens.get(self.pos) {
            None => Ok(value),
            Some(extra) => Err(unexpected(extra)),
        }
    }

    fn next(&mut self) -> Result<&'a Token, RecordError> {
        let token = self.tokens.get(self.pos).ok_or(RecordError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn value(&mut self) -> Result<Value, RecordError> {
        let token = self.next()?;
        match &token.kind {
            TokenKind::LBrace => self.nested(Self::mapping),
            TokenKind::LBracket => self.nested(|d| d.sequence(&TokenKind::RBracket)),
            TokenKind::LParen => self.nested(|d| d.sequence(&TokenKind::RParen)),
            TokenKind::Str(s) => Ok(Value::String(s.clone())),
            TokenKind::Number(text) => number(text),
            TokenKind::Ident(ident) => match ident.as_str() {
                "True" | "true" => Ok(Value::Bool(true)),
                "False" | "false" => Ok(Value::Bool(false)),
                "None" | "null" => Ok(Value::Null),
                other => Err(RecordError::UnknownIdent(other.to_string())),
            },
            _ => Err(unexpected(token)),
        }
    }

    /// Enter one container level, refusing to go past `MAX_DEPTH`
    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, RecordError>,
    ) -> Result<Value, RecordError> {
        if self.depth >= MAX_DEPTH {
            return Err(RecordError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn mapping(&mut self) -> Result<Value, RecordError> {
        let mut map = Map::new();
        loop {
            if self.peek_kind() == Some(&TokenKind::RBrace) {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key_token = self.next()?;
            let TokenKind::Str(key) = &key_token.kind else {
                return Err(unexpected(key_token));
            };
            self.expect(&TokenKind::Colon)?;
            let value = self.value()?;
            map.insert(key.clone(), value);

            let sep = self.next()?;
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::RBrace => return Ok(Value::Object(map)),
                _ => return Err(unexpected(sep)),
            }
        }
    }

    fn sequence(&mut self, close: &TokenKind) -> Result<Value, RecordError> {
        let mut items = Vec::new();
        loop {
            if self.peek_kind() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            let sep = self.next()?;
            if sep.kind == *close {
                return Ok(Value::Array(items));
            }
            if sep.kind != TokenKind::Comma {
                return Err(unexpected(sep));
            }
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), RecordError> {
        let token = self.next()?;
        if token.kind == *kind {
            Ok(())
        } else {
            Err(unexpected(token))
        }
    }
}

fn unexpected(token: &Token) -> RecordError {
    RecordError::UnexpectedToken {
        found: token.kind.to_string(),
        offset: token.offset,
    }
}

fn number(text: &str) -> Result<Value, RecordError> {
    let bad = || RecordError::BadNumber(text.to_string());
    let trimmed = text.strip_prefix('+').unwrap_or(text);

    if !trimmed.contains(['.', 'e', 'E']) {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Ok(Value::Number(Number::from(i)));
        }
    }

    let f: f64 = trimmed.parse().map_err(|_| bad())?;
    Number::from_f64(f).map(Value::Number).ok_or_else(bad)
}

/// Field layout of a record, before revenue resolution and bounds checks
#[derive(Debug, Deserialize)]
struct RawYearRecord {
    #[serde(rename = "Year")]
    year: u32,

    #[serde(rename = "Crop")]
    crop: String,

    #[serde(rename = "NPK Before")]
    npk_before: [f64; 3],

    #[serde(rename = "Fertilizer Added")]
    fertilizer_added: [f64; 3],

    #[serde(rename = "Predicted Yield (q/ha)", alias = "Predicted Yield")]
    predicted_yield: f64,

    #[serde(rename = "Area (ha)", alias = "Area")]
    area_ha: f64,

    #[serde(flatten)]
    rest: Map<String, Value>,
}

fn year_entry(map: Map<String, Value>) -> Result<YearEntry, RecordError> {
    let raw: RawYearRecord = serde_json::from_value(Value::Object(map))
        .map_err(|e| RecordError::Fields(e.to_string()))?;

    let revenue = resolve_revenue(&raw.rest)?;

    check(raw.year >= 1, "year", "must be at least 1")?;
    check(!raw.crop.trim().is_empty(), "crop", "must not be empty")?;
    check(
        raw.npk_before.iter().all(|v| *v >= 0.0),
        "npk_before",
        "must not be negative",
    )?;
    check(
        raw.fertilizer_added.iter().all(|v| *v >= 0.0),
        "fertilizer_added",
        "must not be negative",
    )?;
    check(
        raw.predicted_yield >= 0.0,
        "predicted_yield",
        "must not be negative",
    )?;
    check(raw.area_ha > 0.0, "area_ha", "must be greater than 0")?;
    check(revenue >= 0.0, "revenue", "must not be negative")?;

    Ok(YearEntry {
        year: raw.year,
        crop: raw.crop.trim().to_string(),
        npk_before: raw.npk_before,
        fertilizer_added: raw.fertilizer_added,
        predicted_yield: raw.predicted_yield,
        area_ha: raw.area_ha,
        revenue,
    })
}

/// First present key in priority order wins, even if a later one also exists.
fn resolve_revenue(fields: &Map<String, Value>) -> Result<f64, RecordError> {
    let value = REVENUE_KEYS
        .iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
        .ok_or(RecordError::MissingRevenue)?;

    value
        .as_f64()
        .ok_or_else(|| RecordError::Fields(format!("revenue is not a number: {}", value)))
}

fn check(ok: bool, field: &'static str, problem: &'static str) -> Result<(), RecordError> {
    if ok {
        Ok(())
    } else {
        Err(RecordError::OutOfRange { field, problem })
    }
}
