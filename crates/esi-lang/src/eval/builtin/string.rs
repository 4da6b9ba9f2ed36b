use itertools::Itertools;
use smol_str::SmolStr;

use super::{BuiltinFunction, Error, arg};
use crate::eval::Evaluator;
use crate::eval::runtime_value::RuntimeValue;

pub(super) const METHODS: [BuiltinFunction; 25] = [
    BuiltinFunction::new("charAt", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let index = integer(ev, &arg(args, 0), 0.0)?;
        Ok(char_at(&s, index).unwrap_or_default().into())
    }),
    BuiltinFunction::new("charCodeAt", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let index = integer(ev, &arg(args, 0), 0.0)?;
        let code = (index >= 0.0)
            .then(|| s.get(index as usize))
            .flatten()
            .map(|c| *c as u32 as f64)
            .unwrap_or(f64::NAN);
        Ok(code.into())
    }),
    BuiltinFunction::new("at", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let index = integer(ev, &arg(args, 0), 0.0)?;
        let index = if index < 0.0 { index + s.len() as f64 } else { index };
        Ok(char_at(&s, index)
            .map(RuntimeValue::from)
            .unwrap_or_default())
    }),
    BuiltinFunction::new("indexOf", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let needle = string_arg(ev, args, 0)?.chars().collect_vec();
        let from = clamp(integer(ev, &arg(args, 1), 0.0)?, s.len());
        Ok(find(&s, &needle, from).map_or(-1.0, |i| i as f64).into())
    }),
    BuiltinFunction::new("lastIndexOf", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let needle = string_arg(ev, args, 0)?.chars().collect_vec();
        let found = (0..=s.len().saturating_sub(needle.len()))
            .rev()
            .find(|i| s[*i..].starts_with(&needle));
        Ok(found.map_or(-1.0, |i| i as f64).into())
    }),
    BuiltinFunction::new("includes", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let needle = string_arg(ev, args, 0)?.chars().collect_vec();
        let from = clamp(integer(ev, &arg(args, 1), 0.0)?, s.len());
        Ok(find(&s, &needle, from).is_some().into())
    }),
    BuiltinFunction::new("startsWith", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let needle = string_arg(ev, args, 0)?.chars().collect_vec();
        let from = clamp(integer(ev, &arg(args, 1), 0.0)?, s.len());
        Ok(s[from..].starts_with(&needle).into())
    }),
    BuiltinFunction::new("endsWith", 1, |ev, this, args| {
        let s = chars(ev, this)?;
        let needle = string_arg(ev, args, 0)?.chars().collect_vec();
        let end = clamp(integer(ev, &arg(args, 1), s.len() as f64)?, s.len());
        Ok(s[..end].ends_with(&needle).into())
    }),
    BuiltinFunction::new("slice", 2, |ev, this, args| {
        let s = chars(ev, this)?;
        let start = relative(integer(ev, &arg(args, 0), 0.0)?, s.len());
        let end = relative(integer(ev, &arg(args, 1), s.len() as f64)?, s.len());
        Ok(collect(s.get(start..end.max(start)).unwrap_or_default()))
    }),
    BuiltinFunction::new("substring", 2, |ev, this, args| {
        let s = chars(ev, this)?;
        let start = clamp(integer(ev, &arg(args, 0), 0.0)?, s.len());
        let end = clamp(integer(ev, &arg(args, 1), s.len() as f64)?, s.len());
        Ok(collect(&s[start.min(end)..start.max(end)]))
    }),
    BuiltinFunction::new("toUpperCase", 0, |ev, this, _| {
        Ok(this_string(ev, this)?.to_uppercase().into())
    }),
    BuiltinFunction::new("toLowerCase", 0, |ev, this, _| {
        Ok(this_string(ev, this)?.to_lowercase().into())
    }),
    BuiltinFunction::new("trim", 0, |ev, this, _| {
        Ok(this_string(ev, this)?.trim().into())
    }),
    BuiltinFunction::new("trimStart", 0, |ev, this, _| {
        Ok(this_string(ev, this)?.trim_start().into())
    }),
    BuiltinFunction::new("trimEnd", 0, |ev, this, _| {
        Ok(this_string(ev, this)?.trim_end().into())
    }),
    BuiltinFunction::new("split", 2, |ev, this, args| {
        let s = this_string(ev, this)?;
        let limit = match arg(args, 1) {
            RuntimeValue::Undefined => usize::MAX,
            limit => ev.to_number(&limit)?.to_uint32() as usize,
        };
        let parts: Vec<RuntimeValue> = match arg(args, 0) {
            RuntimeValue::Undefined => vec![s.into()],
            separator => {
                let separator = ev.to_string(&separator)?;
                if separator.is_empty() {
                    s.chars().map(|c| RuntimeValue::from(c.to_string())).collect()
                } else {
                    s.split(separator.as_str()).map(RuntimeValue::from).collect()
                }
            }
        };
        let parts = parts.into_iter().take(limit).collect();
        Ok(ev.heap.alloc_array(parts).into())
    }),
    BuiltinFunction::new("replace", 2, |ev, this, args| replace(ev, this, args, false)),
    BuiltinFunction::new("replaceAll", 2, |ev, this, args| replace(ev, this, args, true)),
    BuiltinFunction::new("repeat", 1, |ev, this, args| {
        let s = this_string(ev, this)?;
        let count = integer(ev, &arg(args, 0), 0.0)?;
        if count < 0.0 || count.is_infinite() {
            return Err(Error::RangeError(format!(
                "Invalid count value: {}",
                crate::number::Number::new(count)
            )));
        }
        Ok(s.repeat(count as usize).into())
    }),
    BuiltinFunction::new("padStart", 2, |ev, this, args| pad(ev, this, args, true)),
    BuiltinFunction::new("padEnd", 2, |ev, this, args| pad(ev, this, args, false)),
    BuiltinFunction::new("concat", 1, |ev, this, args| {
        let mut s = this_string(ev, this)?.to_string();
        for value in args {
            s.push_str(&ev.to_string(value)?);
        }
        Ok(s.into())
    }),
    BuiltinFunction::new("localeCompare", 1, |ev, this, args| {
        let s = this_string(ev, this)?;
        let other = string_arg(ev, args, 0)?;
        Ok(match s.cmp(&other) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        }
        .into())
    }),
    BuiltinFunction::new("toString", 0, |ev, this, _| Ok(this_string(ev, this)?.into())),
    BuiltinFunction::new("valueOf", 0, |ev, this, _| Ok(this_string(ev, this)?.into())),
];

fn this_string(ev: &mut Evaluator, this: &RuntimeValue) -> Result<SmolStr, Error> {
    if this.is_nullish() {
        return Err(Error::TypeError(
            "String.prototype method called on null or undefined".to_string(),
        ));
    }
    Ok(ev.to_string(this)?)
}

fn chars(ev: &mut Evaluator, this: &RuntimeValue) -> Result<Vec<char>, Error> {
    Ok(this_string(ev, this)?.chars().collect())
}

fn string_arg(ev: &mut Evaluator, args: &[RuntimeValue], index: usize) -> Result<SmolStr, Error> {
    Ok(ev.to_string(&arg(args, index))?)
}

/// ToIntegerOrInfinity, with `default` standing in for `undefined`.
pub(super) fn integer(ev: &mut Evaluator, value: &RuntimeValue, default: f64) -> Result<f64, Error> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = ev.to_number(value)?.value();
    Ok(if n.is_nan() { 0.0 } else { n.trunc() })
}

/// Resolves a possibly negative index relative to `len` (`slice`, `splice`).
pub(super) fn relative(index: f64, len: usize) -> usize {
    if index < 0.0 {
        (len as f64 + index).max(0.0) as usize
    } else {
        index.min(len as f64) as usize
    }
}

pub(super) fn clamp(index: f64, len: usize) -> usize {
    index.clamp(0.0, len as f64) as usize
}

fn char_at(s: &[char], index: f64) -> Option<String> {
    if index < 0.0 {
        return None;
    }
    s.get(index as usize).map(|c| c.to_string())
}

fn find(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    (from..haystack.len())
        .take_while(|i| i + needle.len() <= haystack.len())
        .find(|i| haystack[*i..].starts_with(needle))
}

fn collect(chars: &[char]) -> RuntimeValue {
    RuntimeValue::from(chars.iter().collect::<String>())
}

fn replace(
    ev: &mut Evaluator,
    this: &RuntimeValue,
    args: &[RuntimeValue],
    all: bool,
) -> Result<RuntimeValue, Error> {
    let s = this_string(ev, this)?;
    let pattern = string_arg(ev, args, 0)?;
    let replacement = arg(args, 1);

    let mut matches = s.match_indices(pattern.as_str()).map(|(i, _)| i).collect_vec();
    if !all {
        matches.truncate(1);
    }

    let mut result = String::with_capacity(s.len());
    let mut last = 0;
    for start in matches {
        result.push_str(&s[last..start]);
        let piece = match &replacement {
            RuntimeValue::Function(id) => {
                let offset = s[..start].chars().count();
                let value = ev.call_function(
                    *id,
                    RuntimeValue::Undefined,
                    vec![pattern.clone().into(), offset.into(), s.clone().into()],
                    None,
                )?;
                ev.to_string(&value)?.to_string()
            }
            value => expand_replacement(&ev.to_string(value)?, &pattern, &s, start),
        };
        result.push_str(&piece);
        last = start + pattern.len();
    }
    result.push_str(&s[last..]);
    Ok(result.into())
}

/// Expands the `$&`, `` $` ``, `$'` and `$$` patterns of a replacement string.
fn expand_replacement(template: &str, matched: &str, s: &str, start: usize) -> String {
    if !template.contains('$') {
        return template.to_string();
    }
    let mut result = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => result.push('$'),
            Some('&') => result.push_str(matched),
            Some('`') => result.push_str(&s[..start]),
            Some('\'') => result.push_str(&s[start + matched.len()..]),
            _ => {
                result.push('$');
                continue;
            }
        }
        chars.next();
    }
    result
}

fn pad(
    ev: &mut Evaluator,
    this: &RuntimeValue,
    args: &[RuntimeValue],
    at_start: bool,
) -> Result<RuntimeValue, Error> {
    let s = this_string(ev, this)?;
    let target = integer(ev, &arg(args, 0), 0.0)?;
    let fill = match arg(args, 1) {
        RuntimeValue::Undefined => SmolStr::new_static(" "),
        fill => ev.to_string(&fill)?,
    };
    let len = s.chars().count();
    if target <= len as f64 || fill.is_empty() {
        return Ok(s.into());
    }

    let padding: String = fill.chars().cycle().take(target as usize - len).collect();
    Ok(if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
    .into())
}
