use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Utc};
use url::Url;

use super::Query;

/// Bar width requested from the chart endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Interval {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Interval::Daily),
            "1wk" => Ok(Interval::Weekly),
            "1mo" => Ok(Interval::Monthly),
            _ => Err(()),
        }
    }
}

/// Chart request for one symbol, bounded by calendar dates.
///
/// `start` is inclusive. `end` is inclusive as well; when absent the request
/// runs up to the current instant.
#[derive(Clone, Copy, Debug)]
pub struct ChartQuery {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub interval: Interval,
}

impl ChartQuery {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            end: None,
            interval: Interval::Daily,
        }
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    /// Unix seconds at 00:00 UTC of the start date.
    pub fn period1(&self) -> i64 {
        midnight_utc(self.start)
    }

    /// Unix seconds at 00:00 UTC of the day after `end`, or now.
    pub fn period2(&self) -> i64 {
        match self.end.and_then(|end| end.succ_opt()) {
            Some(next) => midnight_utc(next),
            None => Utc::now().timestamp(),
        }
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl Query for ChartQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("period1", &self.period1().to_string())
            .append_pair("period2", &self.period2().to_string())
            .append_pair("interval", &self.interval.to_string());
        url
    }
}
