//! Credential validation for private methods
//!
//! A [`ValidationStrategy`] pulls a token out of the call context. The
//! [`Authenticator`] tries its strategies in order, takes the first token
//! found and hands it to the owner's [`TokenValidator`].

use std::fmt;
use std::sync::Arc;

use quarry_json_rpc::CallContext;
use tracing::debug;

/// Extracts a credential token from a call
pub trait ValidationStrategy: Send + Sync {
    fn extract_token(&self, context: &CallContext) -> Option<String>;
}

type TokenTransform = Arc<dyn Fn(String) -> Option<String> + Send + Sync>;

/// Reads the token from a request header
#[derive(Clone)]
pub struct HeaderStrategy {
    header: String,
    transform: Option<TokenTransform>,
}

impl HeaderStrategy {
    pub const DEFAULT_HEADER: &'static str = "X-Api-Token";

    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            transform: None,
        }
    }

    /// Post-process the raw header value; returning `None` discards it
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// `Authorization: Bearer <token>`
    pub fn bearer() -> Self {
        Self::new("Authorization").with_transform(|value| {
            value
                .strip_prefix("Bearer ")
                .map(|token| token.trim().to_string())
        })
    }
}

impl Default for HeaderStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEADER)
    }
}

impl ValidationStrategy for HeaderStrategy {
    fn extract_token(&self, context: &CallContext) -> Option<String> {
        let raw = context.header(&self.header)?.to_string();
        match &self.transform {
            Some(transform) => transform(raw),
            None => Some(raw),
        }
    }
}

impl fmt::Debug for HeaderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderStrategy")
            .field("header", &self.header)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Reads the token from a cookie
#[derive(Clone)]
pub struct CookieStrategy {
    cookie: String,
    transform: Option<TokenTransform>,
}

impl CookieStrategy {
    pub const DEFAULT_COOKIE: &'static str = "AuthToken";

    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
            transform: None,
        }
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> Option<String> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl Default for CookieStrategy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_COOKIE)
    }
}

impl ValidationStrategy for CookieStrategy {
    fn extract_token(&self, context: &CallContext) -> Option<String> {
        let raw = context.cookie(&self.cookie)?.to_string();
        match &self.transform {
            Some(transform) => transform(raw),
            None => Some(raw),
        }
    }
}

impl fmt::Debug for CookieStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStrategy")
            .field("cookie", &self.cookie)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Owner predicate deciding whether a token grants access to private
/// methods. Receives `None` when no strategy produced a token.
pub type TokenValidator = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Strategy chain plus predicate, fixed at start-up
#[derive(Clone)]
pub struct Authenticator {
    strategies: Vec<Arc<dyn ValidationStrategy>>,
    validator: TokenValidator,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            validator: Arc::new(|_: Option<&str>| true),
        }
    }
}

impl Authenticator {
    pub fn new(strategies: Vec<Arc<dyn ValidationStrategy>>, validator: TokenValidator) -> Self {
        Self {
            strategies,
            validator,
        }
    }

    /// First token produced by the strategies, in order
    pub fn extract_token(&self, context: &CallContext) -> Option<String> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.extract_token(context))
    }

    pub fn authorize(&self, context: &CallContext) -> bool {
        let token = self.extract_token(context);
        let allowed = (self.validator)(token.as_deref());
        debug!(
            token_present = token.is_some(),
            allowed, "Checked credentials for private method"
        );
        allowed
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}
