pub mod matcher;
pub mod pipeline;
pub mod profile_builder;

pub use matcher::Matcher;
pub use pipeline::ItemSpec;
pub use pipeline::MatchPipeline;
pub use profile_builder::ProfileBuilder;
