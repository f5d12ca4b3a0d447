//! Parser for the flat `key[sub][sub] = value` manifest dialect.
//!
//! Each non-blank line assigns one leaf of the tree. `[]` appends the next
//! integer index to the addressed mapping, all-digit segments become integer
//! keys, and lines starting with `;` or `#` are comments. Quoted values are
//! kept verbatim; unquoted integers and booleans are typed.

use crate::dialect::{Dialect, ParseError};
use serde_yaml::{Mapping, Value};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(Value),
    Append,
}

pub fn parse(raw: &str) -> Result<Value, ParseError> {
    let mut root = Mapping::new();
    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(error(
                line_no,
                format!("expected 'key = value', found '{trimmed}'"),
            ));
        };
        let path = parse_key(key.trim(), line_no)?;
        let value = parse_value(value.trim(), line_no)?;
        assign(&mut root, &path, value, line_no)?;
    }
    Ok(Value::Mapping(root))
}

fn error(line: usize, message: String) -> ParseError {
    ParseError {
        dialect: Dialect::Ini,
        line: Some(line),
        message,
    }
}

fn segment_key(raw: &str) -> Value {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<u64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(raw.to_owned())
}

fn parse_key(key: &str, line: usize) -> Result<Vec<Segment>, ParseError> {
    let (base, mut rest) = match key.find('[') {
        Some(pos) => (&key[..pos], &key[pos..]),
        None => (key, ""),
    };
    let base = base.trim();
    if base.is_empty()
        || !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(error(line, format!("invalid key '{key}'")));
    }

    let mut path = vec![Segment::Key(Value::String(base.to_owned()))];
    while !rest.is_empty() {
        let Some(body) = rest.strip_prefix('[') else {
            return Err(error(line, format!("unexpected '{rest}' in key '{key}'")));
        };
        let Some(end) = body.find(']') else {
            return Err(error(line, format!("unterminated '[' in key '{key}'")));
        };
        let segment = body[..end].trim();
        let segment = segment
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| segment.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
            .unwrap_or(segment);
        path.push(if segment.is_empty() {
            Segment::Append
        } else {
            Segment::Key(segment_key(segment))
        });
        rest = &body[end + 1..];
    }
    Ok(path)
}

fn parse_value(raw: &str, line: usize) -> Result<Value, ParseError> {
    for quote in ['"', '\''] {
        if let Some(open) = raw.strip_prefix(quote) {
            return match open.strip_suffix(quote) {
                Some(inner) => Ok(Value::String(inner.to_owned())),
                None => Err(error(line, format!("unterminated quoted value {raw}"))),
            };
        }
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Value::Number(n.into()));
    }
    if raw.eq_ignore_ascii_case("true") {
        return Ok(Value::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Ok(Value::Bool(false));
    }
    Ok(Value::String(raw.to_owned()))
}

fn next_index(map: &Mapping) -> Value {
    let next = map
        .keys()
        .filter_map(Value::as_u64)
        .max()
        .map_or(0, |max| max + 1);
    Value::Number(next.into())
}

fn assign(map: &mut Mapping, path: &[Segment], value: Value, line: usize) -> Result<(), ParseError> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(());
    };
    let key = match first {
        Segment::Key(k) => k.clone(),
        Segment::Append => next_index(map),
    };
    if rest.is_empty() {
        map.insert(key, value);
        return Ok(());
    }
    if !map.contains_key(&key) {
        map.insert(key.clone(), Value::Mapping(Mapping::new()));
    }
    match map.get_mut(&key) {
        Some(Value::Mapping(child)) => assign(child, rest, value, line),
        _ => Err(error(
            line,
            format!(
                "'{}' already holds a value and cannot contain nested keys",
                crate::tree::key_to_string(&key)
            ),
        )),
    }
}
