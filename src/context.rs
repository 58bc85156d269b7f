//! Build context — entry point, router and provider scope for handler assembly
//!
//! Element names are provider-qualified as `name@provider`. While a router
//! is being built, bare middleware and service references are resolved in
//! the namespace of the provider that declared the router.

use std::fmt;

/// Separator between an element name and its provider
pub const PROVIDER_SEPARATOR: char = '@';

/// Scope carried through a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    entry_point: Option<String>,
    router: Option<String>,
    provider: Option<String>,
}

impl BuildContext {
    /// Root context with no scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope this context to an entry point
    pub fn with_entry_point(&self, name: impl Into<String>) -> Self {
        Self {
            entry_point: Some(name.into()),
            ..self.clone()
        }
    }

    /// Scope this context to a router; the provider is taken from the
    /// router's qualified name when present
    pub fn with_router(&self, router_name: &str) -> Self {
        let mut ctx = Self {
            router: Some(router_name.to_string()),
            ..self.clone()
        };

        match router_name.split_once(PROVIDER_SEPARATOR) {
            Some((_, provider)) if !provider.is_empty() => {
                ctx.provider = Some(provider.to_string());
            }
            _ => {
                tracing::debug!(router = router_name, "Could not find a provider for router");
            }
        }
        ctx
    }

    /// Entry point name, if scoped
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Router name, if scoped
    pub fn router(&self) -> Option<&str> {
        self.router.as_deref()
    }

    /// Provider name, if known
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Qualify an element name with the current provider.
    ///
    /// Already qualified names are returned unchanged, as are bare names
    /// when no provider is in scope.
    pub fn qualified_name(&self, name: &str) -> String {
        if name.contains(PROVIDER_SEPARATOR) {
            return name.to_string();
        }
        match &self.provider {
            Some(provider) => make_qualified_name(provider, name),
            None => name.to_string(),
        }
    }

    /// A tracing span carrying this context's scope
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "build",
            entry_point = self.entry_point.as_deref().unwrap_or("-"),
            router = self.router.as_deref().unwrap_or("-"),
        )
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry_point={} router={}",
            self.entry_point.as_deref().unwrap_or("-"),
            self.router.as_deref().unwrap_or("-")
        )
    }
}

/// Join a provider and an element name
pub fn make_qualified_name(provider: &str, name: &str) -> String {
    format!("{}{}{}", name, PROVIDER_SEPARATOR, provider)
}
