//! Aggregation of experiment result streams: medians with confidence
//! intervals per algorithm and per independent variable, and per-instance
//! scatter data.

mod export;
mod results;
mod stats;

pub use export::{
    default_scatter_path, default_summary_path, scatter, summarize, summarize_results,
    write_scatter, write_summary, ScatterData, SummaryRow, SummaryTable,
};
pub use results::{collect_series, metric_value, ResultTable, Series, XBucket};
pub use stats::{confidence_ranks, low_med_high, median_rank, LowMedHigh, Sample};
