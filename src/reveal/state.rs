use crate::parser::LayoutVariant;

/// The control currently used to reveal more items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMechanism {
    AllButton,
    LoadMoreButton,
    MoreButton,
    Exhausted,
}

/// Bookkeeping for one page visit. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealState {
    prior_visible: usize,
    mechanism: RevealMechanism,
    clicks: u32,
    full_page: bool,
}

impl Default for RevealState {
    fn default() -> Self {
        Self::starting_with(RevealMechanism::AllButton)
    }
}

impl RevealState {
    pub fn starting_with(mechanism: RevealMechanism) -> Self {
        Self {
            prior_visible: 0,
            mechanism,
            clicks: 0,
            full_page: false,
        }
    }

    pub fn mechanism(&self) -> RevealMechanism {
        self.mechanism
    }

    pub fn clicks(&self) -> u32 {
        self.clicks
    }

    pub fn prior_visible(&self) -> usize {
        self.prior_visible
    }

    pub fn is_exhausted(&self) -> bool {
        self.mechanism == RevealMechanism::Exhausted
    }

    /// Record how many items are visible now; true if that is more than before
    pub fn observe(&mut self, visible: usize) -> bool {
        let grew = visible > self.prior_visible;
        self.prior_visible = self.prior_visible.max(visible);
        grew
    }

    /// Count a successful click on the current mechanism's control
    pub fn record_click(&mut self) {
        self.clicks += 1;
        if matches!(
            self.mechanism,
            RevealMechanism::AllButton | RevealMechanism::MoreButton
        ) {
            self.full_page = true;
        }
    }

    pub fn switch_to(&mut self, mechanism: RevealMechanism) {
        self.mechanism = mechanism;
    }

    pub fn exhaust(&mut self) {
        self.mechanism = RevealMechanism::Exhausted;
    }

    /// Layout the page ends up in: rich once "All" or "More" has been used
    pub fn layout(&self) -> LayoutVariant {
        if self.full_page {
            LayoutVariant::FullPage
        } else {
            LayoutVariant::Incremental
        }
    }
}
