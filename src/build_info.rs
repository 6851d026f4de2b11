//! Build metadata baked in at compile time.
//!
//! Release pipelines set the `DIAGSNAP_*` variables when building; local
//! builds fall back to the defaults below.

macro_rules! build_env {
    ($name:literal, $default:expr) => {
        match option_env!($name) {
            Some(v) => v,
            None => $default,
        }
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = build_env!("DIAGSNAP_GIT_COMMIT", "unknown");
pub const BUILD_TIME: &str = build_env!("DIAGSNAP_BUILD_TIME", "");

pub const API_VERSION: &str = "1.26";
pub const MIN_API_VERSION: &str = "1.12";

pub const CONTAINERD_COMMIT_ID: &str = build_env!(
    "DIAGSNAP_CONTAINERD_COMMIT",
    "7c3aca7a610df76212171d200ca3811ff6096eb8"
);
pub const RUNTIME_COMMIT_ID: &str = build_env!("DIAGSNAP_RUNTIME_COMMIT", "v1.1.12-0-g51d5e94");
pub const INIT_COMMIT_ID: &str = build_env!(
    "DIAGSNAP_INIT_COMMIT",
    "de40ad007797e0dcd8b7126f27bb87401d224240"
);

/// Component identifiers this build was made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCommits {
    pub containerd: String,
    pub runtime: String,
    pub init: String,
}

impl Default for ExpectedCommits {
    fn default() -> Self {
        Self {
            containerd: CONTAINERD_COMMIT_ID.to_string(),
            runtime: RUNTIME_COMMIT_ID.to_string(),
            init: INIT_COMMIT_ID.to_string(),
        }
    }
}
