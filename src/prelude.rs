//! Prelude module for `policyflow`. Use as a star-import.

pub use crate::device::{
    AudioFormat, InputChannels, InputConfig, InputSource, IoHandle, OutputChannels,
    OutputConfig, OutputFlags,
};
pub use crate::*;
