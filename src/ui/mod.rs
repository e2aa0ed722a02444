//! Terminal presentation for the `symdex` binary

pub mod icons;
pub mod output;
pub mod progress;
pub mod progress_message;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    dim, emphasis, error, header, location, muted, section, status, success, summary_row, warn,
};
pub use progress::ProgressManager;
pub use progress_message::{ProgressMessage, ProgressPhase};
pub use table::{counts_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
