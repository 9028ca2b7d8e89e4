//! Offline session that replays captured pages.
//!
//! Each URL maps to a [`ReplayPage`]: a list of markup snapshots plus the
//! interactions that move between them. CSS locators are evaluated against the
//! current snapshot, so a control exists exactly when the captured markup
//! contains it. XPath locators never match.
//!
//! ```text
//! stage 0 ──click "#load-more-trigger"──▶ stage 1 ──scroll──▶ stage 2
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::app::{CrawlerError, Result};
use crate::browser::{BrowserSession, Locator, Lookup, SessionFactory};

/// What a replayed page went through, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Navigate(String),
    Click { url: String, locator: Locator },
    Scroll { url: String },
    MarkupRead(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Trigger {
    Click(Locator),
    Scroll,
}

#[derive(Debug, Clone)]
struct Transition {
    from: usize,
    trigger: Trigger,
    to: usize,
}

/// Captured snapshots of one URL and how interactions move between them
#[derive(Debug, Clone, Default)]
pub struct ReplayPage {
    stages: Vec<String>,
    transitions: Vec<Transition>,
}

impl ReplayPage {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            stages: vec![initial.into()],
            transitions: Vec::new(),
        }
    }

    /// Append a snapshot, returning its stage index
    pub fn push_stage(&mut self, markup: impl Into<String>) -> usize {
        self.stages.push(markup.into());
        self.stages.len() - 1
    }

    /// Clicking `control` while on `from` shows stage `to`
    pub fn on_click(mut self, from: usize, control: impl Into<Locator>, to: usize) -> Self {
        self.transitions.push(Transition {
            from,
            trigger: Trigger::Click(control.into()),
            to,
        });
        self
    }

    /// Scrolling to the bottom while on `from` shows stage `to`
    pub fn on_scroll(mut self, from: usize, to: usize) -> Self {
        self.transitions.push(Transition {
            from,
            trigger: Trigger::Scroll,
            to,
        });
        self
    }

    /// Build a page whose stages advance one by one each time `control` is clicked
    pub fn clicking_through(control: impl Into<Locator>, stages: Vec<String>) -> Self {
        let control = control.into();
        let mut page = Self::default();
        for markup in stages {
            page.push_stage(markup);
        }
        for from in 1..page.stages.len() {
            page = page.on_click(from - 1, control.clone(), from);
        }
        page
    }

    fn next_stage(&self, from: usize, trigger: &Trigger) -> Option<usize> {
        self.transitions
            .iter()
            .find(|t| t.from == from && &t.trigger == trigger)
            .map(|t| t.to)
    }
}

/// Element matched in the current snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayHandle {
    locator: Locator,
    text: Option<String>,
}

pub struct ReplaySession {
    pages: Arc<HashMap<String, ReplayPage>>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
    current: Option<(String, usize)>,
    unreachable: bool,
}

impl ReplaySession {
    pub fn new(pages: HashMap<String, ReplayPage>) -> Self {
        Self::shared(Arc::new(pages), Arc::new(Mutex::new(Vec::new())))
    }

    fn shared(
        pages: Arc<HashMap<String, ReplayPage>>,
        events: Arc<Mutex<Vec<SessionEvent>>>,
    ) -> Self {
        Self {
            pages,
            events,
            current: None,
            unreachable: false,
        }
    }

    /// Everything this session (and its siblings, when built by a factory) did
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn url(&self) -> String {
        self.current
            .as_ref()
            .map(|(url, _)| url.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self) -> &str {
        self.current
            .as_ref()
            .and_then(|(url, stage)| self.pages.get(url).and_then(|p| p.stages.get(*stage)))
            .map(String::as_str)
            .unwrap_or("<html><head></head><body></body></html>")
    }

    /// Text of every match, plus whether the first match is disabled
    fn matches(&self, locator: &Locator) -> Vec<(String, bool)> {
        let Locator::Css(css) = locator else {
            return Vec::new();
        };
        let Ok(selector) = Selector::parse(css) else {
            tracing::warn!("Replay cannot parse selector {}", css);
            return Vec::new();
        };

        let document = Html::parse_document(self.snapshot());
        document
            .select(&selector)
            .map(|el| {
                let text = el.text().map(str::trim).collect::<Vec<_>>().join(" ");
                let disabled = el.value().attr("disabled").is_some();
                (text.trim().to_string(), disabled)
            })
            .collect()
    }

    fn lookup(&self, locator: &Locator, require_clickable: bool) -> Lookup<ReplayHandle> {
        match self.matches(locator).into_iter().next() {
            Some((_, true)) if require_clickable => Lookup::NotFound,
            Some((text, _)) => Lookup::Found(ReplayHandle {
                locator: locator.clone(),
                text: Some(text).filter(|t| !t.is_empty()),
            }),
            None => Lookup::NotFound,
        }
    }

    fn advance(&mut self, trigger: &Trigger) {
        if let Some((url, stage)) = self.current.as_mut() {
            if let Some(next) = self.pages.get(url.as_str()).and_then(|p| p.next_stage(*stage, trigger)) {
                *stage = next;
            }
        }
    }
}

#[async_trait]
impl BrowserSession for ReplaySession {
    type Handle = ReplayHandle;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.record(SessionEvent::Navigate(url.to_string()));
        if self.unreachable {
            self.current = None;
            return Err(CrawlerError::Browser(format!(
                "Navigation to {} failed: target closed",
                url
            )));
        }
        self.current = Some((url.to_string(), 0));
        Ok(())
    }

    async fn wait_for_element(&mut self, locator: &Locator, _timeout: Duration) -> Lookup<ReplayHandle> {
        self.lookup(locator, false)
    }

    async fn wait_for_clickable(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Lookup<ReplayHandle> {
        self.lookup(locator, true)
    }

    async fn click(&mut self, handle: &ReplayHandle) -> Result<()> {
        if self.current.is_none() {
            return Err(CrawlerError::Browser("Click before navigation".into()));
        }
        self.record(SessionEvent::Click {
            url: self.url(),
            locator: handle.locator.clone(),
        });
        self.advance(&Trigger::Click(handle.locator.clone()));
        Ok(())
    }

    async fn text_of(&mut self, handle: &ReplayHandle) -> Option<String> {
        handle.text.clone()
    }

    async fn current_markup(&mut self) -> Result<String> {
        self.record(SessionEvent::MarkupRead(self.url()));
        Ok(self.snapshot().to_string())
    }

    async fn element_count(&mut self, locator: &Locator) -> usize {
        self.matches(locator).len()
    }

    async fn document_height(&mut self) -> Result<u64> {
        Ok(self.snapshot().len() as u64)
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.record(SessionEvent::Scroll { url: self.url() });
        self.advance(&Trigger::Scroll);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.record(SessionEvent::Closed);
        self.current = None;
        Ok(())
    }
}

/// Hands out replay sessions that share pages and an event log
#[derive(Clone, Default)]
pub struct ReplaySessionFactory {
    pages: Arc<HashMap<String, ReplayPage>>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
    opened: Arc<AtomicUsize>,
    unreachable: bool,
}

impl ReplaySessionFactory {
    pub fn new(pages: HashMap<String, ReplayPage>) -> Self {
        Self {
            pages: Arc::new(pages),
            events: Arc::new(Mutex::new(Vec::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            unreachable: false,
        }
    }

    /// Sessions behave like a crashed browser: every navigation fails
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Sessions handed out by [`open`](SessionFactory::open) so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn session(&self) -> ReplaySession {
        let mut session = ReplaySession::shared(self.pages.clone(), self.events.clone());
        session.unreachable = self.unreachable;
        session
    }
}

#[async_trait]
impl SessionFactory for ReplaySessionFactory {
    type Session = ReplaySession;

    async fn open(&self) -> Result<ReplaySession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.session())
    }
}
