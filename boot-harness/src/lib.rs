//! Boot harness - repeated, supervised boot-trace checks for an emulated kernel
//!
//! Each trial launches the boot command, watches its merged output for a
//! fixed set of patterns, and stops the child as soon as the verdict is in.
//! A campaign repeats trials until the configured count or the first failure.

pub mod buffer;
pub mod campaign;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod process;
pub mod report;
pub mod trial;

pub use buffer::OutputBuffer;
pub use campaign::{Campaign, CampaignResult};
pub use config::Config;
pub use error::{Error, Result};
pub use pattern::PatternSet;
pub use trial::{TrialOutcome, TrialRunner};
