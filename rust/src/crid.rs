//! CRID (Content Reference Identifier) parsing and composition.
//!
//! Format: `crid://rabe.ch/v1[/<show>][#t=clock=YYYYMMDDTHHMMSS.ffZ[&<extra>]]`
//!
//! A [`Crid`] is only ever observable in a valid state: parsing is the single
//! validation point and the builder derives every field itself.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use url::form_urlencoded;

/// Fixed URI scheme of every CRID.
pub const SCHEME: &str = "crid";
/// Fixed URI authority of every CRID.
pub const AUTHORITY: &str = "rabe.ch";

const NANOS_PER_CENTI: u32 = 10_000_000;

/// Errors that can occur while parsing a CRID.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CridError {
    #[error("Scheme mismatch: expected 'crid', got '{0}'")]
    SchemeMismatch(String),
    #[error("Authority mismatch: expected 'rabe.ch', got '{0}'")]
    AuthorityMismatch(String),
    #[error("Unsupported version in path: '{0}'")]
    UnsupportedVersion(String),
    #[error("Unexpected query component: '{0}'")]
    UnexpectedQuery(String),
    #[error("Missing media fragment with clock code: '{0}'")]
    MissingMediaFragment(String),
    #[error("Malformed media fragment clock code: '{0}'")]
    MalformedMediaFragment(String),
}

/// CRID versions understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    #[default]
    V1,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "v1" => Some(Self::V1),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `t=clock=...` media fragment plus any opaque trailing pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFragment {
    start: DateTime<Utc>,
    extra: Option<String>,
}

impl MediaFragment {
    /// Create a fragment starting at `start`, truncated to centiseconds.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start: truncate_to_centis(start),
            extra: None,
        }
    }

    /// Append an opaque fragment after the clock code. Empty strings are ignored.
    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        let extra = extra.into();
        self.extra = (!extra.is_empty()).then_some(extra);
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn extra(&self) -> Option<&str> {
        self.extra.as_deref()
    }
}

impl fmt::Display for MediaFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t=clock={}", format_clock(self.start))?;
        if let Some(extra) = &self.extra {
            write!(f, "&{extra}")?;
        }
        Ok(())
    }
}

/// A validated RaBe CRID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crid {
    version: Version,
    show: Option<String>,
    fragment: Option<MediaFragment>,
}

impl Crid {
    /// Build a CRID from parts that are already canonical.
    pub(crate) fn new(show: Option<String>, fragment: Option<MediaFragment>) -> Self {
        Self {
            version: Version::V1,
            show,
            fragment,
        }
    }

    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    pub fn authority(&self) -> &'static str {
        AUTHORITY
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Canonical show token, `None` for generic identifiers.
    pub fn show(&self) -> Option<&str> {
        self.show.as_deref()
    }

    /// Start of the referenced moment, if the CRID carries a media fragment.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.fragment.as_ref().map(MediaFragment::start)
    }

    pub fn media_fragment(&self) -> Option<&MediaFragment> {
        self.fragment.as_ref()
    }

    pub fn extra_fragment(&self) -> Option<&str> {
        self.fragment.as_ref().and_then(MediaFragment::extra)
    }

    /// True when the CRID does not name a show.
    pub fn is_generic(&self) -> bool {
        self.show.is_none()
    }
}

impl fmt::Display for Crid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{AUTHORITY}/{}", self.version)?;
        if let Some(show) = &self.show {
            write!(f, "/{show}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for Crid {
    type Err = CridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_crid(s)
    }
}

impl Serialize for Crid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_crid(&raw).map_err(serde::de::Error::custom)
    }
}

// RFC 3986, appendix B.
static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$").unwrap()
});

static CLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{8})T(\d{6})\.(\d{2})Z$").unwrap());

/// Validate a CRID string.
pub fn validate_crid(raw: &str) -> bool {
    parse_crid(raw).is_ok()
}

/// Parse a CRID string into its components.
pub fn parse_crid(raw: &str) -> Result<Crid, CridError> {
    // The pattern matches any input; every group is optional.
    let caps = URI_PATTERN
        .captures(raw)
        .ok_or_else(|| CridError::SchemeMismatch(String::new()))?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str());

    let scheme = group(1).unwrap_or_default();
    if scheme != SCHEME {
        return Err(CridError::SchemeMismatch(scheme.to_string()));
    }

    let authority = group(2).unwrap_or_default();
    if authority != AUTHORITY {
        return Err(CridError::AuthorityMismatch(authority.to_string()));
    }

    let path = group(3).unwrap_or_default();
    let (version, show) = parse_path(path)?;

    if let Some(query) = group(4) {
        return Err(CridError::UnexpectedQuery(query.to_string()));
    }

    let fragment = match group(5) {
        Some(fragment) if !fragment.is_empty() => Some(parse_media_fragment(fragment)?),
        _ => None,
    };

    Ok(Crid {
        version,
        show,
        fragment,
    })
}

fn parse_path(path: &str) -> Result<(Version, Option<String>), CridError> {
    let unsupported = || CridError::UnsupportedVersion(path.to_string());

    let mut segments = path.strip_prefix('/').ok_or_else(unsupported)?.split('/');
    let version = segments
        .next()
        .and_then(Version::parse)
        .ok_or_else(unsupported)?;

    match (segments.next(), segments.next()) {
        (None, _) => Ok((version, None)),
        (Some(show), None) if !show.is_empty() => Ok((version, Some(show.to_string()))),
        _ => Err(unsupported()),
    }
}

/// First non-blank value of `key` in a form-encoded `payload`, decoded.
fn query_value<'a>(payload: &'a str, key: &str) -> Option<Cow<'a, str>> {
    form_urlencoded::parse(payload.as_bytes())
        .find_map(|(name, value)| (name == key && !value.is_empty()).then_some(value))
}

fn parse_media_fragment(fragment: &str) -> Result<MediaFragment, CridError> {
    let mut clock_payload = None;
    let mut extra: Vec<&str> = Vec::new();

    // Pairs other than the clock pair are kept verbatim, empty ones included.
    for pair in fragment.split('&') {
        match query_value(pair, "t") {
            Some(value) if clock_payload.is_none() => clock_payload = Some(value),
            _ => extra.push(pair),
        }
    }

    let clock = clock_payload
        .as_deref()
        .and_then(|payload| query_value(payload, "clock"))
        .ok_or_else(|| CridError::MissingMediaFragment(fragment.to_string()))?;

    let start = parse_clock(&clock)
        .ok_or_else(|| CridError::MalformedMediaFragment(fragment.to_string()))?;

    Ok(MediaFragment {
        start,
        extra: (!extra.is_empty()).then(|| extra.join("&")),
    })
}

/// Parse a `YYYYMMDDTHHMMSS.ffZ` clock code.
pub fn parse_clock(clock: &str) -> Option<DateTime<Utc>> {
    let caps = CLOCK_PATTERN.captures(clock)?;
    let date_str = &caps[1];
    let time_str = &caps[2];

    let year: i32 = date_str[0..4].parse().ok()?;
    let month: u32 = date_str[4..6].parse().ok()?;
    let day: u32 = date_str[6..8].parse().ok()?;
    let hour: u32 = time_str[0..2].parse().ok()?;
    let minute: u32 = time_str[2..4].parse().ok()?;
    let second: u32 = time_str[4..6].parse().ok()?;
    let centis: u32 = caps[3].parse().ok()?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()?
        .with_nanosecond(centis * NANOS_PER_CENTI)
}

/// Format an instant as a `YYYYMMDDTHHMMSS.ffZ` clock code, truncating
/// sub-second precision to centiseconds.
pub fn format_clock(ts: DateTime<Utc>) -> String {
    let centis = (ts.nanosecond() % 1_000_000_000) / NANOS_PER_CENTI;
    format!("{}.{:02}Z", ts.format("%Y%m%dT%H%M%S"), centis)
}

fn truncate_to_centis(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond() / NANOS_PER_CENTI * NANOS_PER_CENTI;
    ts.with_nanosecond(nanos).unwrap_or(ts)
}
