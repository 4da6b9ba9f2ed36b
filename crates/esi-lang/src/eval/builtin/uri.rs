use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode_byte, utf8_percent_encode};

use super::{BuiltinFunction, Error, arg, function_value};
use crate::eval::Evaluator;

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `COMPONENT` minus the URI reserved characters and `#`.
const URI: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'#');

const RESERVED: &[u8] = b";/?:@&=+$,#";

/// Bytes `escape` leaves as written.
const ESCAPE_SAFE: &[u8] = b"@*_+-./";

const FUNCTIONS: [BuiltinFunction; 6] = [
    BuiltinFunction::new("encodeURIComponent", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(utf8_percent_encode(&input, COMPONENT).to_string().into())
    }),
    BuiltinFunction::new("encodeURI", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(utf8_percent_encode(&input, URI).to_string().into())
    }),
    BuiltinFunction::new("decodeURIComponent", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(decode(&input, &[])?.into())
    }),
    BuiltinFunction::new("decodeURI", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(decode(&input, RESERVED)?.into())
    }),
    BuiltinFunction::new("escape", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(escape(&input).into())
    }),
    BuiltinFunction::new("unescape", 1, |ev, _, args| {
        let input = ev.to_string(&arg(args, 0))?;
        Ok(unescape(&input).into())
    }),
];

pub(super) fn install(ev: &mut Evaluator) {
    for builtin in FUNCTIONS {
        let function = function_value(ev, builtin);
        ev.define_global(builtin.name, function.into());
    }
}

fn malformed() -> Error {
    Error::UriError("URI malformed".to_string())
}

/// Decodes `%XX` escapes, leaving escapes of the `keep` bytes as written.
///
/// Unlike `percent_decode`, a `%` that does not start a valid escape is an error.
fn decode(input: &str, keep: &[u8]) -> Result<String, Error> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let byte = bytes
            .get(i + 1..i + 3)
            .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(malformed)?;
        if keep.contains(&byte) {
            out.extend_from_slice(&bytes[i..i + 3]);
        } else {
            out.push(byte);
        }
        i += 3;
    }
    String::from_utf8(out).map_err(|_| malformed())
}

/// Works on UTF-16 code units: those below 256 become `%XX`, the rest `%uXXXX`.
fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for unit in input.encode_utf16() {
        match u8::try_from(unit) {
            Ok(byte) if byte.is_ascii_alphanumeric() || ESCAPE_SAFE.contains(&byte) => {
                out.push(char::from(byte))
            }
            Ok(byte) => out.push_str(percent_encode_byte(byte)),
            Err(_) => out.push_str(&format!("%u{unit:04X}")),
        }
    }
    out
}

/// The inverse of [`escape`]. Sequences that are not valid escapes stay as written.
fn unescape(input: &str) -> String {
    let units = input.encode_utf16().collect::<Vec<_>>();
    let mut out = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        if units[i] == u16::from(b'%') {
            let escaped = if units.get(i + 1) == Some(&u16::from(b'u')) {
                hex_unit(&units[i + 2..], 4).map(|unit| (unit, 6))
            } else {
                hex_unit(&units[i + 1..], 2).map(|unit| (unit, 3))
            };
            if let Some((unit, width)) = escaped {
                out.push(unit);
                i += width;
                continue;
            }
        }
        out.push(units[i]);
        i += 1;
    }
    String::from_utf16_lossy(&out)
}

fn hex_unit(units: &[u16], digits: usize) -> Option<u16> {
    units.get(..digits)?.iter().try_fold(0u16, |acc, unit| {
        let digit = char::from_u32(u32::from(*unit))?.to_digit(16)?;
        Some(acc * 16 + digit as u16)
    })
}
