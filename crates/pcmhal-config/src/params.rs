//! Flat `key=value;key=value` parameter strings.
//!
//! Streams and the device accept their runtime parameters (`routing`,
//! `screen_state`) in this form. Entries without `=` are kept with an empty
//! value; later duplicates replace earlier ones.

use core::fmt;

/// Parsed parameter string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrParms {
    pairs: Vec<(String, String)>,
}

impl StrParms {
    /// Parse a parameter string. Never fails; malformed entries are skipped.
    pub fn parse(s: &str) -> Self {
        let mut parms = Self::default();
        for entry in s.split(';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            parms.set(key, value.trim());
        }
        parms
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.pairs.push((key.to_string(), value));
        }
    }

    /// Raw value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer value of `key`; accepts decimal and `0x` hexadecimal.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?;
        let (digits, negative) = match value.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (value, false),
        };
        let magnitude = match digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            Some(hex) => i64::from_str_radix(hex, 16).ok()?,
            None => digits.parse::<i64>().ok()?,
        };
        Some(if negative { -magnitude } else { magnitude })
    }

    /// True when no entries were parsed.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for StrParms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
