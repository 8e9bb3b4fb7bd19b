pub mod encoder_feed;
pub mod metrics;
pub mod trace_sink;

pub use encoder_feed::{EncoderFeed, FeedProfile};
pub use metrics::{init_metrics, serve_metrics};
pub use trace_sink::TraceSink;
