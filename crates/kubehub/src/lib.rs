//! kspy kubehub: watch sources, selectors, and fan-in of watch streams.

#![forbid(unsafe_code)]

pub mod mux;
pub mod selector;
pub mod source;

pub use mux::Multiplexer;
pub use selector::Selector;
pub use source::{split_api_version, EventStream, KubeSource, WatchSource, WatchTarget};

/// Transient failures surfaced inside a watch stream.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch stream error: {0}")]
    Stream(String),
    #[error("server reported watch error {code}: {message}")]
    Server { code: u16, message: String },
    #[error("cannot decode object: {0}")]
    Decode(String),
    #[error("resource {0} is not served by the cluster")]
    NotServed(String),
}
