pub mod types;
pub mod traits;
pub mod state;
pub mod reactions;
pub mod llm_adapter;
pub mod retrier;
pub mod throttle;
pub mod fetcher;
pub mod pipeline;

pub use types::*;
pub use traits::{DedupStore, FeedSource, Submitter, Waiter};
pub use state::FileDedupStore;
pub use llm_adapter::{GenerationRequest, MockReplyGenerator, OpenAiReplyGenerator, ReplyGenerator};
pub use retrier::SubmissionRetrier;
pub use throttle::{RecordingWaiter, Throttler, TokioWaiter};
pub use fetcher::RedditClient;
pub use pipeline::{PipelineBuilder, ReplyPipeline, RunReport};
