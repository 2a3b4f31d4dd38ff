use std::time::Duration;

crate::config_group!({

    /// Timeout applied to every HTTP request issued by the client. Exceeding
    /// it surfaces as a transient error, in the same bucket as rate limiting
    /// and temporary unavailability.
    ///
    /// The default value is 100 seconds.
    ///
    /// Use the environment variable `B2_CLIENT_REQUEST_TIMEOUT` to set this value.
    ref request_timeout: Duration = Duration::from_secs(100);

    /// Number of retries allowed after the first attempt of a JSON API call
    /// that fails with a transient condition.
    ///
    /// The default value is 4 retries.
    ///
    /// Use the environment variable `B2_CLIENT_RETRY_MAX_ATTEMPTS` to set this value.
    ref retry_max_attempts: usize = 4;

    /// Base delay of the exponential backoff between JSON API retries.
    ///
    /// The default value is 250 milliseconds.
    ///
    /// Use the environment variable `B2_CLIENT_RETRY_BASE_DELAY` to set this value.
    ref retry_base_delay: Duration = Duration::from_millis(250);

    /// Fixed delay before the single automatic retry of a part or file
    /// upload that failed with a transient condition.
    ///
    /// The default value is 1 second.
    ///
    /// Use the environment variable `B2_CLIENT_PART_RETRY_DELAY` to set this value.
    ref part_retry_delay: Duration = Duration::from_secs(1);
});
