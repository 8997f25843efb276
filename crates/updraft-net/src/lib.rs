#![forbid(unsafe_code)]

//! HTTP transport for updraft.
//!
//! [`Net`] is the seam every request goes through. [`HttpClient`] is the
//! reqwest implementation; [`TimeoutNet`] and [`RetryNet`] decorate any
//! implementation via [`NetExt`].

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    retry::{DefaultRetryPolicy, RetryNet},
    timeout::TimeoutNet,
    traits::{Net, NetExt},
    types::{Headers, HttpResponse, NetOptions, RetryPolicy},
};
