//! CRID generation for a moment in time.

use chrono::{DateTime, Utc};

use crate::api::ProviderError;
use crate::canonical::canonicalize_show;
use crate::crid::{Crid, MediaFragment};
use crate::strategy::{ShowSource, Strategy};

/// Builds CRIDs, asking `source` which show a moment belongs to.
#[derive(Debug, Clone)]
pub struct CridGenerator<S> {
    source: S,
}

impl<S: ShowSource> CridGenerator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// CRID for `timestamp`, or for the current moment when `None`.
    ///
    /// `fragment` is appended verbatim after the clock code.
    pub fn get(
        &self,
        timestamp: Option<DateTime<Utc>>,
        fragment: Option<&str>,
    ) -> Result<Crid, ProviderError> {
        self.get_at(Utc::now(), timestamp, fragment)
    }

    /// Like [`get`](Self::get), with the reference "now" supplied by the caller.
    pub fn get_at(
        &self,
        now: DateTime<Utc>,
        timestamp: Option<DateTime<Utc>>,
        fragment: Option<&str>,
    ) -> Result<Crid, ProviderError> {
        let target = timestamp.unwrap_or(now);
        let show = Strategy::select(target, now)
            .resolve(&self.source)?
            .map(|raw| canonicalize_show(&raw))
            .filter(|token| !token.is_empty());

        let mut media = MediaFragment::new(target);
        if let Some(extra) = fragment {
            media = media.with_extra(extra);
        }
        Ok(Crid::new(show, Some(media)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crid::parse_crid;
    use crate::strategy::tests::FakeSource;
    use chrono::{TimeZone, Timelike};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn now() -> DateTime<Utc> {
        utc(1993, 3, 1, 0, 0, 0)
    }

    #[test]
    fn test_get_current_show() {
        let generator = CridGenerator::new(FakeSource {
            current: Some("test".to_string()),
            ..FakeSource::default()
        });
        let crid = generator.get_at(now(), None, None).unwrap();
        assert_eq!(crid.to_string(), "crid://rabe.ch/v1/test#t=clock=19930301T000000.00Z");
        assert_eq!(generator.source().calls.borrow().as_slice(), ["now"]);
    }

    #[test]
    fn test_get_past_show() {
        let generator = CridGenerator::new(FakeSource {
            archived: Some("test".to_string()),
            ..FakeSource::default()
        });
        let now = utc(1993, 3, 2, 0, 0, 0);
        let crid = generator
            .get_at(now, Some(utc(1993, 3, 1, 13, 12, 0)), None)
            .unwrap();
        assert_eq!(crid.to_string(), "crid://rabe.ch/v1/test#t=clock=19930301T131200.00Z");
        assert_eq!(
            generator.source().calls.borrow().as_slice(),
            ["past 1993-03-01T14:12:00+01:00"]
        );

        let crid = generator
            .get_at(now, Some(utc(1993, 3, 1, 13, 12, 0)), Some("myid=1234"))
            .unwrap();
        assert_eq!(
            crid.to_string(),
            "crid://rabe.ch/v1/test#t=clock=19930301T131200.00Z&myid=1234"
        );
        assert_eq!(crid.extra_fragment(), Some("myid=1234"));
    }

    #[test]
    fn test_get_past_without_archive_match() {
        let generator = CridGenerator::new(FakeSource::default());
        let crid = generator
            .get_at(utc(1993, 3, 2, 0, 0, 0), Some(utc(1993, 3, 1, 13, 12, 0)), None)
            .unwrap();
        assert!(crid.is_generic());
        assert_eq!(crid.to_string(), "crid://rabe.ch/v1#t=clock=19930301T131200.00Z");
    }

    #[test]
    fn test_get_future_show() {
        let generator = CridGenerator::new(FakeSource {
            scheduled: vec![(
                utc(1993, 3, 1, 11, 0, 0),
                utc(1993, 3, 1, 11, 30, 0),
                "Info".to_string(),
            )],
            ..FakeSource::default()
        });
        let crid = generator
            .get_at(now(), Some(utc(1993, 3, 1, 11, 15, 0)), None)
            .unwrap();
        assert_eq!(crid.show(), Some("info"));

        let crid = generator
            .get_at(now(), Some(utc(1993, 3, 8, 13, 12, 0)), None)
            .unwrap();
        assert_eq!(crid.show(), None);
        assert_eq!(crid.to_string(), "crid://rabe.ch/v1#t=clock=19930308T131200.00Z");
    }

    #[test]
    fn test_get_canonicalizes_show_names() {
        let generator = CridGenerator::new(FakeSource {
            current: Some("à suivre #42".to_string()),
            ..FakeSource::default()
        });
        let crid = generator.get_at(now(), None, None).unwrap();
        assert_eq!(crid.show(), Some("a-suivre-42"));
    }

    #[test]
    fn test_get_drops_names_without_token() {
        let generator = CridGenerator::new(FakeSource {
            current: Some("###".to_string()),
            ..FakeSource::default()
        });
        let crid = generator.get_at(now(), None, None).unwrap();
        assert_eq!(crid.show(), None);
    }

    #[test]
    fn test_get_empty_extra_fragment_ignored() {
        let generator = CridGenerator::new(FakeSource::default());
        let crid = generator.get_at(now(), None, Some("")).unwrap();
        assert_eq!(crid.extra_fragment(), None);
        assert_eq!(crid.to_string(), "crid://rabe.ch/v1#t=clock=19930301T000000.00Z");
    }

    #[test]
    fn test_generated_crid_roundtrips() {
        let generator = CridGenerator::new(FakeSource {
            current: Some("Der Morgen".to_string()),
            ..FakeSource::default()
        });
        let now = utc(2024, 5, 17, 6, 30, 15).with_nanosecond(123_456_789).unwrap();
        let crid = generator.get_at(now, None, Some("myid=1234")).unwrap();
        assert_eq!(
            crid.to_string(),
            "crid://rabe.ch/v1/der-morgen#t=clock=20240517T063015.12Z&myid=1234"
        );
        assert_eq!(parse_crid(&crid.to_string()).unwrap(), crid);
    }

    #[test]
    fn test_get_uses_wall_clock() {
        let generator = CridGenerator::new(FakeSource {
            current: Some("test".to_string()),
            ..FakeSource::default()
        });
        let before = Utc::now();
        let crid = generator.get(None, None).unwrap();
        assert_eq!(crid.show(), Some("test"));
        assert!(crid.start().unwrap() >= before - chrono::TimeDelta::milliseconds(10));
    }
}
