// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP string decoding
//!
//! Handles the doubled-quote escape and the control directives exporters use
//! for non-ASCII text: `\X2\...\X0\` (UTF-16 hex), `\X4\...\X0\` (UTF-32 hex),
//! `\X\HH` (ISO 8859-1 byte), `\S\c` (upper half of the code page) and `\\`.

use std::borrow::Cow;

/// Decode the raw content of a string literal (without the surrounding quotes).
pub fn decode_step_string(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\'') && !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &raw[i..];
        if rest.starts_with("''") {
            out.push('\'');
            i += 2;
        } else if rest.starts_with("\\\\") {
            out.push('\\');
            i += 2;
        } else if let Some(body) = rest.strip_prefix("\\X2\\") {
            match decode_wide(body, 4) {
                Some((decoded, used)) => {
                    out.push_str(&decoded);
                    i += 4 + used;
                }
                None => {
                    out.push('\\');
                    i += 1;
                }
            }
        } else if let Some(body) = rest.strip_prefix("\\X4\\") {
            match decode_wide(body, 8) {
                Some((decoded, used)) => {
                    out.push_str(&decoded);
                    i += 4 + used;
                }
                None => {
                    out.push('\\');
                    i += 1;
                }
            }
        } else if let Some(hex) = rest.strip_prefix("\\X\\").and_then(|r| r.get(..2)) {
            match u8::from_str_radix(hex, 16) {
                Ok(byte) => {
                    out.push(char::from(byte));
                    i += 5;
                }
                Err(_) => {
                    out.push('\\');
                    i += 1;
                }
            }
        } else if let Some(c) = rest.strip_prefix("\\S\\").and_then(|r| r.chars().next()) {
            let code = c as u32;
            match char::from_u32(code + 128).filter(|_| code < 128) {
                Some(shifted) => out.push(shifted),
                None => out.push(c),
            }
            i += 3 + c.len_utf8();
        } else if rest.starts_with("\\P") && rest.get(3..4) == Some("\\") {
            // Code page switch, no visible output
            i += 4;
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            out.push(ch);
            i += ch.len_utf8().max(1);
        }
    }

    Cow::Owned(out)
}

/// Decode hex code units up to the `\X0\` terminator.
/// Returns the decoded text and the number of bytes consumed including the terminator.
fn decode_wide(body: &str, width: usize) -> Option<(String, usize)> {
    let end = body.find("\\X0\\")?;
    let hex = &body[..end];
    if hex.len() % width != 0 {
        return None;
    }

    let mut decoded = String::new();
    if width == 4 {
        let units: Option<Vec<u16>> = (0..hex.len())
            .step_by(4)
            .map(|k| u16::from_str_radix(&hex[k..k + 4], 16).ok())
            .collect();
        decoded = String::from_utf16_lossy(&units?);
    } else {
        for k in (0..hex.len()).step_by(8) {
            let code = u32::from_str_radix(&hex[k..k + 8], 16).ok()?;
            decoded.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
    }

    Some((decoded, end + 4))
}
