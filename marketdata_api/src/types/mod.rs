mod chart;
pub use self::chart::{
    AdjClose, Chart, ChartError, ChartMeta, ChartResponse, ChartResult, DailyBar, Indicators,
    QuoteBlock,
};
