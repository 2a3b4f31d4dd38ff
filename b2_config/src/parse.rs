use std::time::Duration;

use tracing::warn;

/// Parse a configuration value out of an environment variable, falling back
/// to the default (with a warning) when the value does not parse.
pub trait ParsableConfigValue: Sized {
    fn parse(name: &str, value: Option<String>, default: Self) -> Self;
}

macro_rules! impl_from_str_parsable {
    ($($t:ty),+ $(,)?) => {
        $(
            impl ParsableConfigValue for $t {
                fn parse(name: &str, value: Option<String>, default: Self) -> Self {
                    match value {
                        None => default,
                        Some(v) => match v.trim().parse::<$t>() {
                            Ok(parsed) => parsed,
                            Err(_) => {
                                warn!("Ignoring unparsable value {v:?} for {name}.");
                                default
                            },
                        },
                    }
                }
            }
        )+
    };
}

impl_from_str_parsable!(bool, u16, u32, u64, usize, f64, String);

/// Durations accept a "ms" or "s" suffix, or a bare number of seconds.
impl ParsableConfigValue for Duration {
    fn parse(name: &str, value: Option<String>, default: Self) -> Self {
        let Some(v) = value else {
            return default;
        };
        let s = v.trim();

        let parsed = if let Some(millis) = s.strip_suffix("ms") {
            millis.trim().parse::<u64>().ok().map(Duration::from_millis)
        } else {
            let seconds = s.strip_suffix('s').unwrap_or(s).trim();
            seconds
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs >= 0.)
                .map(Duration::from_secs_f64)
        };

        match parsed {
            Some(d) => d,
            None => {
                warn!("Ignoring unparsable duration {v:?} for {name}.");
                default
            },
        }
    }
}
