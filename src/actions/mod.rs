pub mod metadata;
pub mod speech;
pub mod suggest;

pub use metadata::MetadataFetcher;
pub use speech::SpeechSynthesizer;
pub use suggest::QuestionSuggester;
