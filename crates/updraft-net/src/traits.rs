use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use unimock::unimock;
use url::Url;

use crate::{
    error::NetError,
    retry::{DefaultRetryPolicy, RetryNet},
    timeout::TimeoutNet,
    types::{Headers, HttpResponse, RetryPolicy},
};

#[cfg_attr(test, unimock(api = NetMock))]
#[async_trait]
pub trait Net: Send + Sync {
    /// Issue a GET request and buffer the whole response.
    ///
    /// Any 2xx status (including 204) is a success; other statuses become
    /// [`NetError::HttpError`] carrying the response body.
    async fn fetch(&self, url: Url, headers: Option<Headers>) -> Result<HttpResponse, NetError>;
}

#[async_trait]
impl<N: Net + ?Sized> Net for std::sync::Arc<N> {
    async fn fetch(&self, url: Url, headers: Option<Headers>) -> Result<HttpResponse, NetError> {
        (**self).fetch(url, headers).await
    }
}

pub trait NetExt: Net + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }

    /// Add retry layer
    fn with_retry(self, policy: RetryPolicy) -> RetryNet<Self, DefaultRetryPolicy> {
        RetryNet::new(self, DefaultRetryPolicy::new(policy))
    }
}

impl<T: Net> NetExt for T {}
