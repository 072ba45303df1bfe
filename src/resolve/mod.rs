pub mod art;
pub mod dedupe;
pub mod fetcher;
pub mod matcher;
pub mod pipeline;
