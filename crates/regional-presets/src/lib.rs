//! Regional Prompting Presets
//!
//! Named sets of regional prompting settings (divide mode, ratios, base
//! weights and prompt flags) kept in a small CSV file next to the host.
//!
//! ```text
//! "name","mode","divide ratios","baseratios","use base","usecom","usencom"
//! Vertical-3,Vertical,"1,1,1","",False,False,False
//! Horizontal-3,Horizontal,"1,1,1","",False,False,False
//! Horizontal-7,Horizontal,"1,1,1,1,1,1,1","0.2",True,False,False
//! lastrun,Matrix,"1;1,1","",False,False,False
//! ```
//!
//! Loading never fails: an unreadable file yields the built-in presets, and
//! a missing one is created with them.

mod error;
mod preset;
mod store;

pub use error::{PresetError, Result};
pub use preset::{parse_bool, split_row, Preset, HEADER, LAST_RUN};
pub use store::PresetStore;

/// Default preset file name
pub const DEFAULT_FILE_NAME: &str = "regional_prompter_presets.csv";

/// Prelude for common imports
pub mod prelude {
    pub use super::{Preset, PresetError, PresetStore, Result};
}
