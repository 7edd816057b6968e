//! RaBe web services that know which show is on air.
//!
//! - songticker: the show currently on air (XML)
//! - archive (raar): broadcasts by exact local start time (JSON)
//! - LibreTime: the upcoming schedule (JSON)

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use url::Url;

use crate::session::Session;
use crate::strategy::ShowSource;

pub const SONGTICKER_URL: &str = "https://songticker.rabe.ch/songticker/0.9.3/current.xml";
pub const ARCHIVE_BROADCASTS_URL: &str = "https://archiv.rabe.ch/api/broadcasts/";
pub const LIBRETIME_LIVE_INFO_URL: &str =
    "https://airtime.service.int.rabe.ch/api/live-info-v2/format/json";

/// Errors raised while talking to a show provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Endpoints and transport settings for [`RabeApi`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub songticker_url: String,
    pub archive_url: String,
    pub libretime_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff_factor: f64,
    pub backoff_max_secs: u64,
    /// Days of schedule to request from LibreTime.
    pub schedule_days: u32,
    /// Upper bound on schedule entries to request from LibreTime.
    pub schedule_shows: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            songticker_url: SONGTICKER_URL.to_string(),
            archive_url: ARCHIVE_BROADCASTS_URL.to_string(),
            libretime_url: LIBRETIME_LIVE_INFO_URL.to_string(),
            timeout_secs: 10,
            retries: 5,
            backoff_factor: 0.1,
            backoff_max_secs: 120,
            schedule_days: 7,
            schedule_shows: 7000,
        }
    }
}

impl ApiConfig {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[derive(Debug, Deserialize)]
struct Ticker {
    show: Option<TickerShow>,
}

#[derive(Debug, Deserialize)]
struct TickerShow {
    name: Option<String>,
    link: Option<TickerLink>,
}

#[derive(Debug, Deserialize)]
struct TickerLink {
    #[serde(rename = "$text", default)]
    href: String,
}

#[derive(Debug, Deserialize)]
struct Broadcasts {
    #[serde(default)]
    data: Vec<Broadcast>,
}

#[derive(Debug, Deserialize)]
struct Broadcast {
    attributes: BroadcastAttributes,
}

#[derive(Debug, Deserialize)]
struct BroadcastAttributes {
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiveInfo {
    #[serde(default)]
    station: Station,
    shows: ScheduleShows,
}

#[derive(Debug, Default, Deserialize)]
struct Station {
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScheduleShows {
    #[serde(default)]
    next: Vec<ScheduledShow>,
}

#[derive(Debug, Deserialize)]
struct ScheduledShow {
    name: Option<String>,
    #[serde(default)]
    url: String,
    starts: String,
    ends: String,
}

/// [`ShowSource`] backed by the RaBe web services.
#[derive(Debug, Clone)]
pub struct RabeApi {
    config: ApiConfig,
    session: Session,
}

impl RabeApi {
    pub fn new(config: ApiConfig) -> Result<Self, ProviderError> {
        let session = Session::new(&config)?;
        Ok(Self { config, session })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn archive_url(&self, at: DateTime<Tz>) -> String {
        format!(
            "{}/{}",
            self.config.archive_url.trim_end_matches('/'),
            at.format("%Y/%m/%d/%H%M%S")
        )
    }
}

impl ShowSource for RabeApi {
    fn current_show(&self) -> Result<Option<String>, ProviderError> {
        let body = self.session.get_text(&self.config.songticker_url, &[])?;
        let ticker: Ticker = quick_xml::de::from_str(&body)?;
        let Some(show) = ticker.show else {
            debug!("songticker reports no show");
            return Ok(None);
        };
        Ok(show_from_link(show.link.map(|link| link.href).as_deref(), show.name))
    }

    fn archived_show(&self, at: DateTime<Tz>) -> Result<Option<String>, ProviderError> {
        let url = self.archive_url(at);
        let body = self.session.get_text(&url, &[])?;
        let broadcasts: Broadcasts = serde_json::from_str(&body)?;
        match broadcasts.data.as_slice() {
            [broadcast] => Ok(broadcast.attributes.label.clone()),
            other => {
                debug!(%url, matches = other.len(), "no unique archived broadcast");
                Ok(None)
            }
        }
    }

    fn scheduled_show(&self, at: DateTime<Utc>) -> Result<Option<String>, ProviderError> {
        let query = [
            ("days", self.config.schedule_days.to_string()),
            ("shows", self.config.schedule_shows.to_string()),
        ];
        let body = self.session.get_text(&self.config.libretime_url, &query)?;
        let info: LiveInfo = serde_json::from_str(&body)?;
        let tz = station_timezone(info.station.timezone.as_deref());

        for show in info.shows.next {
            let (Some(starts), Some(ends)) = (
                parse_station_time(&show.starts, tz),
                parse_station_time(&show.ends, tz),
            ) else {
                warn!(
                    starts = %show.starts,
                    ends = %show.ends,
                    "skipping unparsable schedule entry"
                );
                continue;
            };
            if starts <= at && at <= ends {
                return Ok(show_from_link(Some(show.url.as_str()), show.name));
            }
        }
        debug!(%at, "no scheduled show covers target");
        Ok(None)
    }
}

/// Show token from a show page link, falling back to the display name when
/// the link is missing or has no path.
fn show_from_link(link: Option<&str>, name: Option<String>) -> Option<String> {
    link.and_then(path_stem).or(name)
}

/// Stem of the last non-empty path segment of `link`.
///
/// Relative links (`/klangbecken`, `rabe.ch/info`) are read as paths.
fn path_stem(link: &str) -> Option<String> {
    let link = link.trim();
    let absolute = Url::parse(link).ok();
    let path = match &absolute {
        Some(url) => url.path(),
        None => link.split(['?', '#']).next().unwrap_or_default(),
    };
    let segment = path.rsplit('/').find(|segment| !segment.is_empty())?;
    let segment = percent_decode_str(segment).decode_utf8_lossy();
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment.as_ref(),
    };
    Some(stem.to_string())
}

fn station_timezone(raw: Option<&str>) -> Tz {
    match raw.map(str::parse::<Tz>) {
        Some(Ok(tz)) => tz,
        Some(Err(_)) => {
            warn!(timezone = ?raw, "unknown station timezone, assuming UTC");
            Tz::UTC
        }
        None => Tz::UTC,
    }
}

fn parse_station_time(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
