//! Free-text queries over the index
//!
//! `intent` turns text into an `Intent` through an ordered rule table,
//! `engine` resolves intents against the store, `results` holds the typed
//! records every answer is made of.

pub mod engine;
pub mod intent;
pub mod results;

pub use engine::{DEFAULT_LIMIT, QueryEngine};
pub use intent::{Intent, classify};
pub use results::{Description, MatchTier, QueryResponse, ResultRecord, SymbolMatch};
