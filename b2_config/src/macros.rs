/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```rust
/// use b2_config::config_group;
///
/// config_group!({
///     ref test_int: usize = 42;
///     ref test_string: String = "default".to_string();
/// });
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields, a
/// `Default` implementation holding the declared values, and an
/// `apply_env_overrides` method that loads overrides from environment
/// variables named `B2_{GROUP}_{FIELD}`, where the group name is taken from
/// the enclosing module.
#[macro_export]
macro_rules! config_group {
    ({
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParsableConfigValue;

        /// ConfigValueGroup struct containing all configurable values
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            /// This is an alias for `Default::default()`.
            pub fn new() -> Self {
                Self::default()
            }

            /// Apply environment variable overrides to this configuration group.
            ///
            /// The group name is derived from the module path. For example, in module
            /// `b2_config::groups::client`, the env var for `request_timeout` is
            /// `B2_CLIENT_REQUEST_TIMEOUT`.
            pub fn apply_env_overrides(&mut self) {
                let group = module_path!().rsplit("::").next().unwrap_or_default();

                $(
                    {
                        let env_var_name =
                            format!("B2_{}_{}", group.to_uppercase(), stringify!($name).to_uppercase());

                        let maybe_env_value = std::env::var(&env_var_name).ok();

                        let default_value: $type = $value;
                        self.$name = <$type>::parse(stringify!($name), maybe_env_value, default_value);
                    }
                )+
            }
        }

        /// Type alias for easier reference in config aggregation
        pub(crate) type ConfigValues = ConfigValueGroup;
    };
}
