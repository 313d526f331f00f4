// ── Object storage ──
//
// The normalization store is owned by the model actor. The result board
// is the read side: it publishes each watch's materialized list so that
// readers never have to round-trip through the actor.

mod normalize;
mod results;

pub use normalize::{NormalizationStore, Normalized};
pub use results::Snapshot;
pub(crate) use results::ResultBoard;
