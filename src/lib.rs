//! Bondprompt: prompt selection and response recovery for bond trading
//! instructions.
//!
//! Short Chinese trading messages go in; a context-appropriate prompt goes
//! out to a local text generator; whatever comes back is recovered into a
//! typed trade record. Nothing here trusts the generator to emit valid JSON.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod providers;

pub mod analysis;
pub mod prompts;

pub mod normalize;
pub mod recovery;

pub mod pipeline;
pub mod tools;
