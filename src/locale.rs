use std::cmp::Ordering;

use crate::{config::LocaleConfig, error::ConfigError};

/// Locales
///
/// The validated, immutable locale set. Every locale this type hands out is one of the
/// supported tags, so redirects built from it always land on a routable prefix.
#[derive(Debug, Clone)]
pub struct Locales {
    supported: Vec<String>,
    default: String,
}

impl Locales {
    pub fn new(config: &LocaleConfig) -> Result<Self, ConfigError> {
        if config.supported.is_empty() {
            return Err(ConfigError::NoLocales);
        }

        if let Some(bad) = config.supported.iter().find(|tag| !is_valid_tag(tag)) {
            return Err(ConfigError::MalformedLocale(bad.clone()));
        }

        if !config.supported.contains(&config.default) {
            return Err(ConfigError::UnknownDefaultLocale(config.default.clone()));
        }

        Ok(Self {
            supported: config.supported.clone(),
            default: config.default.clone(),
        })
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn default_locale(&self) -> &str {
        &self.default
    }

    /// Returns the supported locale the path is prefixed with, if any.
    /// `/en` and `/en/...` are qualified; `/english` and `/enx/...` are not.
    pub fn locale_of(&self, path: &str) -> Option<&str> {
        let first = path.strip_prefix('/')?.split('/').next()?;
        self.supported
            .iter()
            .find(|tag| tag.as_str() == first)
            .map(String::as_str)
    }

    /// negotiate
    ///
    /// Picks the best supported locale for an `Accept-Language` header. Ranges are tried
    /// by descending quality (ties keep header order); each range matches a supported tag
    /// exactly, then by primary language subtag. `*`, an absent header, or no overlap
    /// falls back to the default.
    pub fn negotiate(&self, accept_language: Option<&str>) -> &str {
        let Some(header) = accept_language else {
            return &self.default;
        };

        for range in parse_accept_language(header) {
            if range == "*" {
                return &self.default;
            }
            if let Some(tag) = self.lookup(range) {
                return tag;
            }
        }

        &self.default
    }

    fn lookup(&self, range: &str) -> Option<&str> {
        let exact = self
            .supported
            .iter()
            .find(|tag| tag.eq_ignore_ascii_case(range));

        exact
            .or_else(|| {
                let primary = primary_subtag(range);
                self.supported
                    .iter()
                    .find(|tag| primary_subtag(tag).eq_ignore_ascii_case(primary))
            })
            .map(String::as_str)
    }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

fn is_valid_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|p| (2..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphabetic()));
    primary_ok && parts.all(|p| (1..=8).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_alphanumeric()))
}

/// Splits an `Accept-Language` header into language ranges ordered by preference.
/// Ranges with `q=0` or an unparsable weight are dropped.
fn parse_accept_language(header: &str) -> Vec<&str> {
    let mut ranges: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut params = entry.split(';');
            let range = params.next()?.trim();
            if range.is_empty() {
                return None;
            }

            let quality = match params.find_map(|p| p.trim().strip_prefix("q=")) {
                Some(q) => q.trim().parse::<f32>().ok()?,
                None => 1.0,
            };

            (quality > 0.0).then_some((range, quality))
        })
        .collect();

    ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranges.into_iter().map(|(range, _)| range).collect()
}
