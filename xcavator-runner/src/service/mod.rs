//! Service layer
//!
//! Services are the transform and publish collaborators invoked by the
//! standard pipeline tasks: article fetching, summarization, speech
//! synthesis, video rendering and publishing.
//!
//! All services are trait-based to enable testing and dependency injection.

mod article;
mod publisher;
mod speech;
mod summarizer;
mod video;

// Re-export traits
pub use article::ArticleFetcher;
pub use publisher::Publisher;
pub use speech::SpeechSynthesizer;
pub use summarizer::Summarizer;
pub use video::VideoRenderer;

// Re-export implementations
pub use article::HtmlArticleFetcher;
pub use publisher::SocialsPublisher;
pub use speech::PiperSpeech;
pub use summarizer::FrequencySummarizer;
pub use video::FfmpegRenderer;
