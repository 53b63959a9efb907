#![forbid(unsafe_code)]

//! Search engine: an append-only candidate store and a coordinator that
//! ranks it on a fixed pool of worker threads.
//!
//! Every query change starts a new *generation*. Work is split into one
//! contiguous shard per worker; each worker keeps only its best `L`
//! matches and the coordinator merges the shard lists once all of them
//! have arrived. Reports from older generations are dropped, so a result
//! set never mixes two queries.
//!
//! Ranking is by score (descending) and then by input index (ascending),
//! which makes results independent of worker count and scheduling.

mod coordinator;
mod error;
mod rank;
mod store;
mod worker;

pub use coordinator::{Coordinator, SearchConfig, search_all};
pub use error::SearchError;
pub use rank::{Generation, RankMode, ResultSet, ScoredMatch, TopK};
pub use store::{CandidateStore, Snapshot};
