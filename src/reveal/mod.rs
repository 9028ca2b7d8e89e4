//! Shared machinery for revealing lazily-rendered items.
//!
//! Both engines reveal content by clicking controls until nothing more
//! renders. They share the [`RevealState`] bookkeeping and the adaptive
//! [`DelayPolicy`]; the review engine additionally drives a
//! [`RevealStrategy`] through its three stages.

mod delay;
mod state;

pub use delay::DelayPolicy;
pub use state::{RevealMechanism, RevealState};

use async_trait::async_trait;

use crate::app::Result;

/// The capability set a review page offers for revealing more items.
///
/// Every method returns `Ok(false)` when its control is absent; that is the
/// normal signal to fall through to the next stage.
#[async_trait]
pub trait RevealStrategy: Send {
    /// Click "All" and keep scrolling until the page stops growing
    async fn try_all(&mut self) -> Result<bool>;

    /// Click "Load More" once
    async fn try_load_more(&mut self) -> Result<bool>;

    /// Click the trailing "More" control once
    async fn try_more(&mut self) -> Result<bool>;
}

/// Run the review reveal protocol: "All" if offered, otherwise "Load More"
/// until it disappears (at most `max_load_more` times), then "More" once.
pub async fn reveal_all<R: RevealStrategy + ?Sized>(strategy: &mut R, max_load_more: u32) -> Result<()> {
    if strategy.try_all().await? {
        return Ok(());
    }

    let mut clicks = 0;
    while clicks < max_load_more && strategy.try_load_more().await? {
        clicks += 1;
    }
    if clicks > 0 && clicks == max_load_more {
        tracing::warn!("Stopped after {} \"Load More\" clicks", clicks);
    }

    strategy.try_more().await?;
    Ok(())
}
