//! built-in block handlers
//!
//! One module per block type (the sharing blocks share one). Each module holds the typed result of the block and
//! the handler that builds it, see [crate::handler] for the contracts.
pub mod assert;
pub mod bundle;
pub mod component;
pub mod define;
pub mod environment;
pub mod generate;
pub mod globals;
pub mod script;
pub mod sharing;
pub mod stack;
pub mod terramate;
pub mod vendor;
