mod common;
pub use self::common::Query;

mod chart;
pub use self::chart::{ChartQuery, Interval};
