//! Gate that keeps critical packages from ever reaching `pm uninstall`.

const PROTECTED_PACKAGES: &[&str] = &[
    "com.android.settings",
    "com.android.systemui",
    "com.samsung.android.launcher",
    "com.android.vending",
    "com.google.android.gms",
    "com.samsung.android.dialer",
    "com.samsung.android.messaging",
    "com.android.contacts",
    "com.android.camera2",
    "android.auto_generated_rro_vendor__",
    "android.auto_generated_rro_product__",
];

const PROTECTED_PREFIXES: &[&str] = &["com.android.", "com.samsung.android."];

const PROTECTED_SUBSTRINGS: &[&str] = &["systemui", "launcher"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalDecision {
    Allow,
    Deny(String),
}

#[derive(Debug, Clone, Default)]
pub struct ProtectionList {
    extra: Vec<String>,
}

impl ProtectionList {
    /// Built-in rules plus `extra` exact identifiers.
    pub fn new(extra: Vec<String>) -> Self {
        Self { extra }
    }

    pub fn check(&self, identifier: &str) -> RemovalDecision {
        if PROTECTED_PACKAGES.contains(&identifier) || self.extra.iter().any(|id| id == identifier) {
            return RemovalDecision::Deny("Cannot uninstall system app for safety".to_string());
        }
        if let Some(prefix) = PROTECTED_PREFIXES.iter().find(|p| identifier.starts_with(*p)) {
            return RemovalDecision::Deny(format!("Packages under '{}' are protected", prefix));
        }
        if let Some(part) = PROTECTED_SUBSTRINGS.iter().find(|s| identifier.contains(*s)) {
            return RemovalDecision::Deny(format!("Packages containing '{}' are protected", part));
        }
        RemovalDecision::Allow
    }

    pub fn is_protected(&self, identifier: &str) -> bool {
        matches!(self.check(identifier), RemovalDecision::Deny(_))
    }
}
