//! ---
//! tsf_section: "01-core-functionality"
//! tsf_subsection: "module"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Shared primitives and utilities for the adapter runtime."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use serde::Serialize;

/// Build metadata reported by `--version` and the session banner.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    /// Workspace semantic version.
    pub semver: String,
    /// Git commit hash when the build environment exports one.
    pub git_sha: String,
    /// Target triple used for the build.
    pub target: String,
    /// Cargo profile used during compilation.
    pub profile: String,
}

impl VersionInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("TSF_GIT_SHA").unwrap_or("UNKNOWN").to_owned(),
            target: option_env!("TSF_BUILD_TARGET")
                .unwrap_or(std::env::consts::ARCH)
                .to_owned(),
            profile: if cfg!(debug_assertions) {
                "debug".to_owned()
            } else {
                "release".to_owned()
            },
        }
    }

    /// Human readable banner used in logging surfaces.
    #[must_use]
    pub fn banner(&self) -> String {
        format!("TSF v{} (git {})", self.semver, self.git_sha)
    }

    /// Multi-line string for `--version` flags.
    #[must_use]
    pub fn extended(&self) -> String {
        format!(
            "{banner}\nTarget: {target}\nProfile: {profile}",
            banner = self.banner(),
            target = self.target,
            profile = self.profile
        )
    }
}
