//! Client-side build pipeline
//!
//! Inspect an upload, convert and compile what the cache does not already hold, then
//! fuse the results into one zip. Remote services sit behind the [`CompileService`]
//! and [`ConvertService`] traits.

pub mod compile;
pub mod config;
pub mod convert;
mod error;
mod exec;
pub mod fuse;
pub mod http;
pub mod remote;
mod runner;

pub use compile::{binary_key, BuildResult, CompileClient, CompileOutcome};
pub use config::ClientConfig;
pub use convert::{validate_assets, ConversionClient, ConversionOutcome};
pub use error::{PipelineError, Result};
pub use fuse::{fuse_loose, fuse_packaged, FusedOutput};
pub use http::{HttpCompileService, HttpConvertService};
pub use remote::{CompileRequest, CompileService, ConvertRequest, ConvertService, RemoteError, RemoteResponse};
pub use runner::{BundleOutput, Bundler};
