//! Browser sessions driven by the discovery and review engines.
//!
//! A session owns one page and is driven through `&mut self`, so a single
//! caller at a time. Parallel collection opens one session per worker through
//! a [`SessionFactory`].
//!
//! Missing elements are not errors: lookups return [`Lookup::NotFound`] once
//! their timeout elapses and callers fall back to the next reveal mechanism.

mod chrome;
mod config;
pub mod replay;

pub use chrome::{ChromeSession, ChromeSessionFactory};
pub use config::SessionConfig;
pub use replay::{ReplayPage, ReplaySession, ReplaySessionFactory, SessionEvent};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;

/// How to find an element on the page.
///
/// In config files a locator is a plain CSS selector, or an XPath expression
/// prefixed with `xpath:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        match s.strip_prefix("xpath:") {
            Some(expr) => Locator::XPath(expr.trim().to_string()),
            None => Locator::Css(s),
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::from(s.to_string())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        match locator {
            Locator::Css(s) => s,
            Locator::XPath(x) => format!("xpath:{}", x),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(x) => write!(f, "xpath={}", x),
        }
    }
}

/// Outcome of waiting for an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<H> {
    Found(H),
    NotFound,
}

impl<H> Lookup<H> {
    #[cfg(test)]
    pub(crate) fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn found(self) -> Option<H> {
        match self {
            Lookup::Found(h) => Some(h),
            Lookup::NotFound => None,
        }
    }
}

/// One exclusively-owned browser page
#[async_trait]
pub trait BrowserSession: Send {
    type Handle: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Wait until an element matching `locator` is present in the DOM
    async fn wait_for_element(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Lookup<Self::Handle>;

    /// Wait until an element matching `locator` is visible and enabled
    async fn wait_for_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Lookup<Self::Handle>;

    /// Scroll the element into view, then click it
    async fn click(&mut self, handle: &Self::Handle) -> Result<()>;

    async fn text_of(&mut self, handle: &Self::Handle) -> Option<String>;

    /// Rendered markup of the whole document as it is now
    async fn current_markup(&mut self) -> Result<String>;

    async fn element_count(&mut self, locator: &Locator) -> usize;

    async fn document_height(&mut self) -> Result<u64>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens independent sessions for concurrent workers
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: BrowserSession + 'static;

    async fn open(&self) -> Result<Self::Session>;
}
