#![warn(rust_2018_idioms)]

pub mod api;
pub mod app_data;
pub mod consumer;
pub mod device;
pub mod dtls_transport;
pub mod error;
pub mod handler;
pub mod ice_transport;
pub mod observer;
pub(crate) mod operation;
pub mod ortc;
pub mod producer;
pub mod remote_sdp;
pub mod rtp_parameters;
pub mod sctp_transport;
pub mod track;
pub mod transport;

pub use error::{Error, Result};

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";
