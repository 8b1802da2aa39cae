use super::EmulatorConfig;

/// Cached env-var flag: returns `true` only when the env var is set to `"1"`.
macro_rules! env_bool_eq1 {
    ($name:ident, $var:expr) => {
        #[inline]
        pub(crate) fn $name() -> bool {
            use std::sync::OnceLock;
            static V: OnceLock<bool> = OnceLock::new();
            *V.get_or_init(|| matches!(std::env::var($var), Ok(v) if v == "1"))
        }
    };
}

/// Cached env-var parsed as `Option<u32>`, ignoring zero.
macro_rules! env_option_u32_nonzero {
    ($name:ident, $var:expr) => {
        pub(crate) fn $name() -> Option<u32> {
            use std::sync::OnceLock;
            static V: OnceLock<Option<u32>> = OnceLock::new();
            *V.get_or_init(|| {
                std::env::var($var)
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .filter(|&v| v > 0)
            })
        }
    };
}

impl EmulatorConfig {
    env_option_u32_nonzero!(env_resync_interval, "SNES_RESYNC_INTERVAL");
    env_bool_eq1!(env_force_pal, "SNES_FORCE_PAL");
}
