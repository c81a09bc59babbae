//! A thin CloudStack API client.
//!
//! Every request is signed with the account secret, every response is
//! unwrapped from its envelope, async jobs are polled until they finish and
//! list commands are paged until the last page. The single entry point is
//! [`CloudStack::execute`](client::CloudStack::execute).

pub mod client;
pub mod config;
pub mod consts;
pub mod envelope;
pub mod error;
pub mod profile;
pub mod signing;
pub mod transport;

pub use client::CloudStack;
pub use config::{ClientConfig, PollPolicy};
pub use error::{AsyncJobError, ClientError, DecodeError, Result};
pub use signing::ParameterSet;
