//! Runtime environment detection.
//!
//! Strategy selection only needs two facts about the host: whether it is a
//! mobile browser and whether it is iOS. Both come from user-agent sniffing,
//! which is fragile, so the orchestrator asks an [`EnvironmentProvider`]
//! instead of reading a global. Tests hand it a fixed [`EnvironmentProfile`].

use std::sync::LazyLock;

use regex::Regex;

/// Matches user agents of phones, tablets and other handheld browsers.
#[allow(clippy::expect_used)]
static MOBILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Android|webOS|iPhone|iPad|iPod|BlackBerry|IEMobile|Opera Mini")
        .expect("mobile UA regex is valid") // Static pattern, safe to panic
});

/// Matches iOS devices. iPadOS in desktop mode reports a Macintosh UA and is
/// treated as desktop.
#[allow(clippy::expect_used)]
static IOS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"iPad|iPhone|iPod").expect("iOS UA regex is valid") // Static pattern, safe to panic
});

/// The facts strategy selection depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentProfile {
    pub is_mobile: bool,
    pub is_ios: bool,
}

impl EnvironmentProfile {
    /// Desktop browser.
    pub const DESKTOP: Self = Self {
        is_mobile: false,
        is_ios: false,
    };

    /// Android or another non-iOS mobile browser.
    pub const ANDROID: Self = Self {
        is_mobile: true,
        is_ios: false,
    };

    /// iPhone, iPad or iPod.
    pub const IOS: Self = Self {
        is_mobile: true,
        is_ios: true,
    };

    /// Derives a profile from a user-agent string.
    ///
    /// ```
    /// use resource_dl::EnvironmentProfile;
    ///
    /// let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
    /// assert_eq!(EnvironmentProfile::from_user_agent(ua), EnvironmentProfile::IOS);
    /// ```
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        let is_ios = IOS_PATTERN.is_match(user_agent);
        Self {
            is_mobile: is_ios || MOBILE_PATTERN.is_match(user_agent),
            is_ios,
        }
    }
}

/// Source of the [`EnvironmentProfile`] for one invocation.
pub trait EnvironmentProvider: Send + Sync {
    /// Returns the profile of the current host. Called once per download.
    fn profile(&self) -> EnvironmentProfile;
}

impl EnvironmentProvider for EnvironmentProfile {
    fn profile(&self) -> EnvironmentProfile {
        *self
    }
}

/// Sniffs the profile from a user-agent string captured at construction.
#[derive(Debug, Clone)]
pub struct UserAgentEnvironment {
    user_agent: String,
}

impl UserAgentEnvironment {
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

impl EnvironmentProvider for UserAgentEnvironment {
    fn profile(&self) -> EnvironmentProfile {
        EnvironmentProfile::from_user_agent(&self.user_agent)
    }
}
