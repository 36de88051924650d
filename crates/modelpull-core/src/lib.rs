//! Core domain types and ports for modelpull.
//!
//! - `download` - requests, states, progress snapshots, and the error taxonomy
//! - `ports` - the `HttpTransport` abstraction the downloader is built on
//! - `config` - `DownloadConfig`
//! - `paths` - download directory resolution

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod download;
pub mod paths;
pub mod ports;

pub use config::DownloadConfig;
pub use download::{
    DownloadError, DownloadProgress, DownloadRequest, DownloadState, PartRange, plan_parts,
};
pub use paths::{
    DOWNLOAD_DIR_ENV, DownloadDirResolution, DownloadDirSource, PathError, default_download_dir,
    resolve_download_dir,
};
pub use ports::{BodyStream, ByteRange, HttpTransport, TransportResponse};
