use crate::config::RedactionConfig;
use crate::error::{ExplorerError, Result};
use crate::platform::ResourceEntry;
use regex::RegexSet;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Shown in place of a sensitive value, after the provider prefix if any.
pub const MASK: &str = "***********";

/// Longest provider prefix kept, separator included.
const MAX_PREFIX_LEN: usize = 8;

/// Display-time masking for entries whose key looks secret.
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    patterns: RegexSet,
}

impl RedactionPolicy {
    pub fn new<I, S>(patterns: I) -> std::result::Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }

    pub fn from_config(config: &RedactionConfig) -> Result<Self> {
        Self::new(&config.patterns)
            .map_err(|err| ExplorerError::Config(format!("invalid redaction pattern: {err}")))
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.patterns.is_match(key)
    }

    pub fn mask_for<'a>(&self, key: &str, value: &'a str) -> Cow<'a, str> {
        if !self.is_sensitive(key) {
            return Cow::Borrowed(value);
        }
        let masked = match provider_prefix(value) {
            Some(prefix) => Cow::Owned(format!("{prefix}{MASK}")),
            None => Cow::Borrowed(MASK),
        };
        // A value already shaped like its own mask gets the longer bare form.
        if masked == value {
            return Cow::Owned(format!("{MASK}*"));
        }
        masked
    }

    /// Renders an entry as a one-field JSON object, `{"key":"value"}`, with the value masked.
    pub fn display_entry(&self, entry: &ResourceEntry) -> String {
        let shown = if self.is_sensitive(&entry.key) {
            let raw = match &entry.value {
                Value::String(text) => Cow::Borrowed(text.as_str()),
                other => Cow::Owned(other.to_string()),
            };
            Value::String(self.mask_for(&entry.key, &raw).into_owned())
        } else {
            entry.value.clone()
        };
        let mut object = Map::new();
        object.insert(entry.key.clone(), shown);
        Value::Object(object).to_string()
    }
}

/// `sk-abc1` → `sk-`: an alphanumeric head and its separator, at most
/// `MAX_PREFIX_LEN` chars, kept only when more of the value follows it than the
/// head itself reveals.
fn provider_prefix(value: &str) -> Option<&str> {
    let head_len = value
        .bytes()
        .take_while(u8::is_ascii_alphanumeric)
        .count();
    if head_len == 0 || head_len >= MAX_PREFIX_LEN {
        return None;
    }
    let separator = value.as_bytes().get(head_len)?;
    if *separator != b'-' && *separator != b'_' {
        return None;
    }
    let prefix_len = head_len + 1;
    if value.len() - prefix_len <= head_len {
        return None;
    }
    Some(&value[..prefix_len])
}
