//! Time-relative show resolution.
//!
//! The moment a CRID refers to decides who knows which show was on air:
//! the songticker for "now", the archive for the past and the schedule for
//! the future. [`Strategy::select`] picks one per call and
//! [`Strategy::resolve`] asks it, collapsing every empty answer into `None`.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::api::ProviderError;

/// Local timezone the archive indexes broadcasts by.
pub const ARCHIVE_TIMEZONE: Tz = chrono_tz::Europe::Zurich;

/// Something that can name the show on air at a given moment.
///
/// Implementations return `Ok(None)` (or an empty string) when no show is
/// known; errors are reserved for transport and decoding failures.
pub trait ShowSource {
    /// Show currently on air.
    fn current_show(&self) -> Result<Option<String>, ProviderError>;

    /// Show broadcast at an exact local time in [`ARCHIVE_TIMEZONE`].
    fn archived_show(&self, at: DateTime<Tz>) -> Result<Option<String>, ProviderError>;

    /// Show scheduled to cover `at`.
    fn scheduled_show(&self, at: DateTime<Utc>) -> Result<Option<String>, ProviderError>;
}

impl<T: ShowSource + ?Sized> ShowSource for &T {
    fn current_show(&self) -> Result<Option<String>, ProviderError> {
        (**self).current_show()
    }

    fn archived_show(&self, at: DateTime<Tz>) -> Result<Option<String>, ProviderError> {
        (**self).archived_show(at)
    }

    fn scheduled_show(&self, at: DateTime<Utc>) -> Result<Option<String>, ProviderError> {
        (**self).scheduled_show(at)
    }
}

impl<T: ShowSource + ?Sized> ShowSource for Box<T> {
    fn current_show(&self) -> Result<Option<String>, ProviderError> {
        (**self).current_show()
    }

    fn archived_show(&self, at: DateTime<Tz>) -> Result<Option<String>, ProviderError> {
        (**self).archived_show(at)
    }

    fn scheduled_show(&self, at: DateTime<Utc>) -> Result<Option<String>, ProviderError> {
        (**self).scheduled_show(at)
    }
}

/// Which source answers for a requested moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Now,
    Past(DateTime<Tz>),
    Future(DateTime<Utc>),
}

impl Strategy {
    /// Choose a strategy by comparing `target` against a `now` sampled once
    /// by the caller. Only an exact match counts as "now".
    pub fn select(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let strategy = if target == now {
            Self::Now
        } else if target < now {
            Self::Past(target.with_timezone(&ARCHIVE_TIMEZONE))
        } else {
            Self::Future(target)
        };
        debug!(%target, %now, strategy = strategy.as_str(), "selected show strategy");
        strategy
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::Past(_) => "past",
            Self::Future(_) => "future",
        }
    }

    /// Ask `source` for the raw show name. Blank answers become `None`.
    pub fn resolve<S: ShowSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Option<String>, ProviderError> {
        let raw = match *self {
            Self::Now => source.current_show()?,
            Self::Past(at) => source.archived_show(at)?,
            Self::Future(at) => source.scheduled_show(at)?,
        };
        let show = raw
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        debug!(strategy = self.as_str(), show = ?show, "resolved show");
        Ok(show)
    }
}
