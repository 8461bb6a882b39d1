//! tc-av: everything that shells out.
//!
//! The engine never does CPU-heavy media work in-process; probing, segment
//! encoding, live transcoding, thumbnailing, and archive extraction are all
//! short- or long-lived external processes. This crate owns tool discovery,
//! process execution, and the collaborator traits (`Prober`,
//! `SourceResolver`, `Encoder`) the server consumes as trait objects so
//! tests can substitute mocks.

pub mod command;
pub mod encode;
pub mod probe;
pub mod source;
pub mod tools;

pub use command::{ToolCommand, ToolOutput};
pub use encode::{
    Encoder, FfmpegEncoder, HwAccel, LiveHandle, LiveSpec, SegmentSpec, SegmentStream,
    ThumbnailSpec,
};
pub use probe::{FfprobeProber, Prober};
pub use source::{FsResolver, Resolved, SourceResolver};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
