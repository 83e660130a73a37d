//! Provisioning protocol for SPMC shared-memory ring buffers.
//!
//! A ring named `x` is two segments: `x.hdr` (metadata plus producer and
//! consumer control sections) and `x.dat` (the slots). [`Producer::create`]
//! stands a ring up and attaches to it; [`Consumer::attach`] opens an
//! existing one read-mostly. Neither implements enqueue/dequeue: they hand
//! out the sections that algorithm lives in.

mod admin;
mod consumer;
mod error;
mod params;
mod producer;
mod sections;

pub use admin::{RingReport, describe, remove};
pub use consumer::Consumer;
pub use error::RingError;
pub use params::RingParams;
pub use producer::Producer;
