mod dedup;

pub use dedup::DedupCache;
pub use dedup::Fingerprint;
pub use dedup::SweeperHandle;
