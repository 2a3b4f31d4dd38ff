crate::config_group!({

    /// Smallest size the service accepts for any part other than the last
    /// one of a large file.
    ///
    /// The default value is 5 MiB.
    ///
    /// Use the environment variable `B2_TRANSFER_MIN_PART_SIZE` to set this value.
    ref min_part_size: u64 = 5 * 1024 * 1024;

    /// Largest part number the service accepts. Part numbers start at 1.
    ///
    /// The default value is 10000.
    ///
    /// Use the environment variable `B2_TRANSFER_MAX_PART_NUMBER` to set this value.
    ref max_part_number: u16 = 10_000;

    /// Fan-out width used by the convenience part-upload driver when the
    /// caller does not pick one.
    ///
    /// The default value is 4 concurrent part uploads.
    ///
    /// Use the environment variable `B2_TRANSFER_DEFAULT_PART_CONCURRENCY` to set this value.
    ref default_part_concurrency: usize = 4;
});
