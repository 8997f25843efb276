use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
#[cfg(test)]
use unimock::unimock;
use url::Url;

use crate::{
    error::NetError,
    traits::Net,
    types::{Headers, HttpResponse, RetryPolicy},
};

#[cfg_attr(test, unimock(api = RetryClassifierMock))]
pub trait RetryClassifier {
    fn should_retry(&self, error: &NetError) -> bool;
}

#[derive(Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn should_retry(&self, error: &NetError) -> bool {
        error.is_retryable()
    }
}

pub struct DefaultRetryPolicy {
    classifier: DefaultRetryClassifier,
    policy: RetryPolicy,
}

impl DefaultRetryPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            classifier: DefaultRetryClassifier,
            policy,
        }
    }
}

#[cfg_attr(test, unimock(api = RetryPolicyMock))]
pub trait RetryPolicyTrait: Send + Sync {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool;
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
    fn max_attempts(&self) -> u32;
}

impl RetryPolicyTrait for DefaultRetryPolicy {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool {
        if attempt >= self.policy.max_retries {
            return false;
        }
        self.classifier.should_retry(error)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.policy.delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_retries
    }
}

/// Retry decorator for Net implementations
pub struct RetryNet<N, P> {
    inner: N,
    retry_policy: P,
}

impl<N: Net, P: RetryPolicyTrait> RetryNet<N, P> {
    pub fn new(inner: N, retry_policy: P) -> Self {
        Self {
            inner,
            retry_policy,
        }
    }
}

#[async_trait]
impl<N: Net, P: RetryPolicyTrait> Net for RetryNet<N, P> {
    async fn fetch(&self, url: Url, headers: Option<Headers>) -> Result<HttpResponse, NetError> {
        let mut attempt = 0;
        loop {
            match self.inner.fetch(url.clone(), headers.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) if self.retry_policy.should_retry(&error, attempt) => {
                    attempt += 1;
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    tracing::debug!(%url, attempt, ?delay, %error, "retrying request");
                    sleep(delay).await;
                }
                Err(error) if attempt > 0 => {
                    return Err(NetError::RetryExhausted {
                        max_retries: attempt,
                        source: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use unimock::{MockFn, Unimock, matching};

    use super::*;
    use crate::traits::NetMock;

    fn fast_policy(max_retries: u32) -> DefaultRetryPolicy {
        DefaultRetryPolicy::new(RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            max_retries,
        })
    }

    fn ok_response() -> HttpResponse {
        HttpResponse::new(200, Headers::new(), "success")
    }

    fn not_found() -> NetError {
        NetError::HttpError {
            url: Url::parse("http://test.com").unwrap(),
            status: 404,
            body: None,
        }
    }

    #[rstest]
    #[case(0, true, "first attempt should retry")]
    #[case(2, true, "third attempt should retry")]
    #[case(3, false, "fourth attempt should not retry (max=3)")]
    fn test_default_retry_policy_should_retry_max_retries(
        #[case] attempt: u32,
        #[case] expected: bool,
        #[case] _desc: &str,
    ) {
        let retry_policy = DefaultRetryPolicy::new(RetryPolicy::default());
        assert_eq!(
            retry_policy.should_retry(&NetError::Timeout, attempt),
            expected
        );
    }

    #[rstest]
    fn test_default_retry_policy_should_not_retry_non_retryable() {
        let retry_policy = DefaultRetryPolicy::new(RetryPolicy::default());
        assert!(!retry_policy.should_retry(&not_found(), 0));
    }

    #[rstest]
    fn test_classifier_mock_drives_policy_decision() {
        let classifier = Unimock::new(
            RetryClassifierMock::should_retry
                .some_call(matching!(_))
                .returns(false),
        );
        assert!(!RetryClassifier::should_retry(&classifier, &NetError::Timeout));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_retry_net_fetch_success_first_try() {
        let mock = Unimock::new(
            NetMock::fetch
                .some_call(matching!(_, _))
                .returns(Ok(ok_response())),
        );
        let retry_net = RetryNet::new(mock, fast_policy(3));

        let result = retry_net
            .fetch(Url::parse("http://test.com").unwrap(), None)
            .await;

        assert_eq!(result.unwrap().body, "success");
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_retry_net_fetch_retry_then_success() {
        let mock = Unimock::new((
            NetMock::fetch
                .next_call(matching!(_, _))
                .returns(Err(NetError::Timeout)),
            NetMock::fetch
                .next_call(matching!(_, _))
                .returns(Err(NetError::Timeout)),
            NetMock::fetch
                .next_call(matching!(_, _))
                .returns(Ok(ok_response())),
        ));
        let retry_net = RetryNet::new(mock, fast_policy(3));

        let result = retry_net
            .fetch(Url::parse("http://test.com").unwrap(), None)
            .await;

        assert!(result.is_ok());
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_retry_net_fetch_max_retries_exhausted() {
        let mock = Unimock::new(
            NetMock::fetch
                .each_call(matching!(_, _))
                .returns(Err(NetError::Timeout)),
        );
        let retry_net = RetryNet::new(mock, fast_policy(2));

        let result = retry_net
            .fetch(Url::parse("http://test.com").unwrap(), None)
            .await;

        assert!(matches!(
            result,
            Err(NetError::RetryExhausted { max_retries: 2, .. })
        ));
    }

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_retry_net_fetch_non_retryable_error_is_returned_as_is() {
        let mock = Unimock::new(
            NetMock::fetch
                .some_call(matching!(_, _))
                .returns(Err(not_found())),
        );
        let retry_net = RetryNet::new(mock, fast_policy(3));

        let result = retry_net
            .fetch(Url::parse("http://test.com").unwrap(), None)
            .await;

        assert_eq!(result.unwrap_err().status_code(), Some(404));
    }

    #[rstest]
    fn test_retry_policy_trait_delay() {
        let retry_policy = DefaultRetryPolicy::new(RetryPolicy {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
            max_retries: 3,
        });
        assert_eq!(retry_policy.max_attempts(), 3);
        assert_eq!(retry_policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(retry_policy.delay_for_attempt(1), Duration::from_millis(50));
    }
}
