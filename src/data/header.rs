use thiserror::Error;

use super::model::{Header, HeaderValue};

/// Length of a single header card.
pub const CARD_LEN: usize = 80;
/// Header and data blocks are padded to this size.
pub const BLOCK_LEN: usize = 2880;

/// Keywords whose cards carry free text rather than a value.
const COMMENTARY_KEYS: [&str; 3] = ["COMMENT", "HISTORY", ""];

/// Longest string piece written per card, before quote doubling.
const LONG_STRING_PIECE: usize = 33;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    #[error("card contains bytes outside printable ASCII")]
    NotAscii,
    #[error("card is {0} bytes long, expected 80")]
    BadLength(usize),
    #[error("unterminated string value")]
    UnterminatedString,
    #[error("card for '{0}' does not fit in 80 characters")]
    TooLong(String),
}

/// One parsed 80-character header card.
#[derive(Debug, Clone, PartialEq)]
pub enum Card {
    Value { key: String, value: HeaderValue },
    /// `COMMENT`, `HISTORY`, blank keyword or any keyword without `= `.
    Commentary { key: String, text: String },
    /// A `CONTINUE` string piece of a long string value.
    Continue(String),
    End,
}

/// Is this key stored as accumulated free text?
pub fn is_commentary(key: &str) -> bool {
    COMMENTARY_KEYS.contains(&key)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one raw card.
pub fn parse_card(raw: &[u8]) -> Result<Card, CardError> {
    if raw.len() != CARD_LEN {
        return Err(CardError::BadLength(raw.len()));
    }
    if raw.iter().any(|b| !(0x20..=0x7e).contains(b)) {
        return Err(CardError::NotAscii);
    }
    let text = std::str::from_utf8(raw).map_err(|_| CardError::NotAscii)?;
    let keyword = text[..8].trim_end();
    let rest = &text[8..];

    if keyword == "END" {
        return Ok(Card::End);
    }
    if is_commentary(keyword) {
        return Ok(Card::Commentary {
            key: keyword.to_string(),
            text: rest.trim_end().to_string(),
        });
    }
    if keyword == "CONTINUE" {
        return Ok(match rest.trim_start().strip_prefix('\'') {
            Some(quoted) => Card::Continue(parse_quoted(quoted)?),
            None => Card::Commentary {
                key: keyword.to_string(),
                text: rest.trim_end().to_string(),
            },
        });
    }
    if keyword == "HIERARCH" {
        if let Some(eq) = rest.find('=') {
            return Ok(Card::Value {
                key: rest[..eq].trim().to_string(),
                value: parse_value(&rest[eq + 1..])?,
            });
        }
    }
    if rest.starts_with("= ") {
        return Ok(Card::Value {
            key: keyword.to_string(),
            value: parse_value(&rest[2..])?,
        });
    }

    Ok(Card::Commentary {
        key: keyword.to_string(),
        text: rest.trim_end().to_string(),
    })
}

/// Parse the value field (everything after `= `), dropping any inline comment.
fn parse_value(field: &str) -> Result<HeaderValue, CardError> {
    let field = field.trim_start();
    if let Some(quoted) = field.strip_prefix('\'') {
        return parse_quoted(quoted).map(HeaderValue::Text);
    }

    let token = field.split('/').next().unwrap_or("").trim();
    Ok(match token {
        "" => HeaderValue::Null,
        "T" => HeaderValue::Bool(true),
        "F" => HeaderValue::Bool(false),
        _ => {
            if let Ok(i) = token.parse::<i64>() {
                HeaderValue::Integer(i)
            } else if let Ok(f) = token.replace(['D', 'd'], "E").parse::<f64>() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::Text(token.to_string())
            }
        }
    })
}

/// Read a quoted string whose opening quote is already consumed.
/// `''` stands for a literal quote; trailing blanks are not significant.
fn parse_quoted(s: &str) -> Result<String, CardError> {
    let mut out = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                out.truncate(out.trim_end().len());
                return Ok(out);
            }
        } else {
            out.push(c);
        }
    }
    Err(CardError::UnterminatedString)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format one header entry as one or more padded 80-character cards.
pub fn format_cards(key: &str, value: &HeaderValue) -> Result<Vec<String>, CardError> {
    if is_commentary(key) {
        let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
        return Ok(text
            .split('\n')
            .flat_map(|line| chunk(line, CARD_LEN - 8))
            .map(|piece| pad(format!("{key:<8}{piece}")))
            .collect());
    }

    if let HeaderValue::Text(s) = value {
        if quote(s).len() > CARD_LEN - 12 {
            return format_long_string(key, s);
        }
    }

    let field = match value {
        HeaderValue::Text(s) => format!("{:<20}", quote(s)),
        HeaderValue::Integer(i) => format!("{i:>20}"),
        HeaderValue::Float(v) if v.is_finite() => format!("{:>20}", format_float(*v)),
        HeaderValue::Float(_) | HeaderValue::Null => String::new(),
        HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
    };

    let card = if key.len() <= 8 && !key.contains(' ') {
        format!("{key:<8}= {field}")
    } else {
        format!("HIERARCH {key} = {}", field.trim())
    };
    if card.trim_end().len() > CARD_LEN {
        return Err(CardError::TooLong(key.to_string()));
    }
    Ok(vec![pad(card)])
}

/// Encode a whole header, terminated by an `END` card. No block padding.
pub fn encode_header(header: &Header) -> Result<String, CardError> {
    let mut out = String::with_capacity((header.len() + 1) * CARD_LEN);
    for (key, value) in header.iter() {
        for card in format_cards(key, value)? {
            out.push_str(&card);
        }
    }
    out.push_str(&pad("END".to_string()));
    Ok(out)
}

/// Long strings are split over `CONTINUE` cards, each piece but the last ending in `&`.
fn format_long_string(key: &str, s: &str) -> Result<Vec<String>, CardError> {
    let pieces = chunk(s, LONG_STRING_PIECE);
    let last = pieces.len() - 1;
    let mut cards = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.iter().enumerate() {
        let body = if i < last {
            quote(&format!("{piece}&"))
        } else {
            quote(piece)
        };
        let card = if i == 0 {
            if key.len() > 8 {
                format!("HIERARCH {key} = {body}")
            } else {
                format!("{key:<8}= {body}")
            }
        } else {
            format!("CONTINUE  {body}")
        };
        if card.len() > CARD_LEN {
            return Err(CardError::TooLong(key.to_string()));
        }
        cards.push(pad(card));
    }
    Ok(cards)
}

fn quote(s: &str) -> String {
    format!("'{:<8}'", s.replace('\'', "''"))
}

fn format_float(v: f64) -> String {
    // Debug keeps a decimal point or an exponent, both of which FITS requires.
    format!("{v:?}").replace('e', "E")
}

fn pad(card: String) -> String {
    format!("{card:<80}")
}

/// Split into pieces of at most `width` characters; an empty line stays one piece.
fn chunk(s: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}
