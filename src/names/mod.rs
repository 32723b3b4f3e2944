//! Display-name resolution as an ordered chain of tiers.
//!
//! Each tier either produces a name or declines; the first non-empty answer
//! wins. A chain always ends in a total fallback, so resolution never fails.
pub mod app_names;
pub mod device_names;

use async_trait::async_trait;

/// One step of a resolution chain.
#[async_trait]
pub trait NameTier<Q: Sync + ?Sized>: Send + Sync {
    /// Short name used in logs.
    fn label(&self) -> &'static str;

    /// Returns a name, or `None` to let the next tier try.
    async fn resolve(&self, query: &Q) -> Option<String>;
}

/// Tiers tried in order, followed by a fallback that cannot fail.
pub struct ResolverChain<Q: Sync + ?Sized> {
    tiers: Vec<Box<dyn NameTier<Q>>>,
    fallback: fn(&Q) -> String,
}

impl<Q: Sync + ?Sized> ResolverChain<Q> {
    pub fn new(fallback: fn(&Q) -> String) -> Self {
        Self {
            tiers: Vec::new(),
            fallback,
        }
    }

    /// Appends a tier after the existing ones.
    pub fn with_tier(mut self, tier: impl NameTier<Q> + 'static) -> Self {
        self.tiers.push(Box::new(tier));
        self
    }

    pub async fn resolve(&self, query: &Q) -> String {
        for tier in &self.tiers {
            if let Some(name) = tier.resolve(query).await {
                let name = name.trim();
                if !name.is_empty() {
                    log::debug!("[NAMES] Resolved by tier '{}': {}", tier.label(), name);
                    return name.to_string();
                }
            }
        }
        (self.fallback)(query)
    }
}

/// Upper-cases the first character and leaves the rest untouched.
pub(crate) fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
