//! Markup parsing for listing and review pages.
//!
//! The parser never fails a record because one field is missing: every field
//! is looked up independently and replaced by its sentinel when absent.
//!
//! Review pages come in two layouts depending on how the reviews were
//! revealed, and the caller has to say which one it is looking at:
//!
//! ```text
//! "All" / "More" control  → LayoutVariant::FullPage     (data-testid selectors)
//! "Load More" trigger     → LayoutVariant::Incremental  (legacy class selectors)
//! ```

mod votes;

pub use votes::{parse_leading_count, parse_trailing_count, parse_vote_count};

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::domain::review::{NO_CONTENT, NO_DATE, NO_RATING, NO_SUMMARY, UNKNOWN_AUTHOR};
use crate::domain::{RawMovieCard, Review};

/// Which review markup the page was rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVariant {
    /// Rich layout rendered after the "All" or "More" controls
    FullPage,
    /// Legacy layout rendered by the "Load More" trigger
    Incremental,
}

impl LayoutVariant {
    pub fn other(self) -> Self {
        match self {
            LayoutVariant::FullPage => LayoutVariant::Incremental,
            LayoutVariant::Incremental => LayoutVariant::FullPage,
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e}"))
}

struct MovieCardSelectors {
    card: Selector,
    title: Selector,
    link: Selector,
}

static MOVIE_CARD: LazyLock<MovieCardSelectors> = LazyLock::new(|| MovieCardSelectors {
    card: selector("li.ipc-metadata-list-summary-item"),
    title: selector("h3.ipc-title__text"),
    link: selector("a.ipc-title-link-wrapper"),
});

struct ReviewSelectors {
    card: Selector,
    rating: Selector,
    summary: Selector,
    body: Selector,
    author: Selector,
    date: Selector,
    votes: VoteSelectors,
}

enum VoteSelectors {
    /// Separate up/down counters such as "1.2K" and "38"
    Counters { up: Selector, down: Selector },
    /// One sentence: "12 out of 15 found this helpful."
    Sentence(Selector),
}

static FULL_PAGE: LazyLock<ReviewSelectors> = LazyLock::new(|| ReviewSelectors {
    card: selector("article.user-review-item"),
    rating: selector("span.ipc-rating-star--rating"),
    summary: selector(r#"span[data-testid="review-summary"]"#),
    body: selector("div.ipc-html-content-inner-div"),
    author: selector(r#"a[data-testid="author-link"]"#),
    date: selector("li.review-date"),
    votes: VoteSelectors::Counters {
        up: selector("span.ipc-voting__label__count--up"),
        down: selector("span.ipc-voting__label__count--down"),
    },
});

static INCREMENTAL: LazyLock<ReviewSelectors> = LazyLock::new(|| ReviewSelectors {
    card: selector("div.lister-item.mode-detail.imdb-user-review"),
    rating: selector("span.rating-other-user-rating span"),
    summary: selector("a.title"),
    body: selector("div.text.show-more__control"),
    author: selector("span.display-name-link a"),
    date: selector("span.review-date"),
    votes: VoteSelectors::Sentence(selector("div.actions.text-muted")),
});

static HELPFUL_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\d,]+)\s+out of\s+([\d,]+)\s+found this helpful")
        .expect("helpful sentence regex should compile")
});

impl LayoutVariant {
    fn selectors(self) -> &'static ReviewSelectors {
        match self {
            LayoutVariant::FullPage => &FULL_PAGE,
            LayoutVariant::Incremental => &INCREMENTAL,
        }
    }
}

/// Extract every movie card from a listing page
pub fn parse_movie_cards(markup: &str) -> Vec<RawMovieCard> {
    let document = Html::parse_document(markup);
    let s = &*MOVIE_CARD;

    document
        .select(&s.card)
        .map(|card| RawMovieCard {
            title: first_text(&card, &s.title),
            href: card
                .select(&s.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
        })
        .collect()
}

/// Extract every review card rendered in the given layout
pub fn parse_review_cards(markup: &str, variant: LayoutVariant) -> Vec<Review> {
    let document = Html::parse_document(markup);
    let s = variant.selectors();

    document
        .select(&s.card)
        .map(|card| parse_review(&card, s))
        .collect()
}

fn parse_review(card: &ElementRef<'_>, s: &ReviewSelectors) -> Review {
    let (helpful, unhelpful) = match &s.votes {
        VoteSelectors::Counters { up, down } => (
            first_text(card, up).map_or(0, |t| parse_vote_count(&t)),
            first_text(card, down).map_or(0, |t| parse_vote_count(&t)),
        ),
        VoteSelectors::Sentence(sel) => first_text(card, sel)
            .and_then(|t| parse_helpful_sentence(&t))
            .unwrap_or((0, 0)),
    };

    Review {
        summary: first_text(card, &s.summary).unwrap_or_else(|| NO_SUMMARY.to_string()),
        body: first_text(card, &s.body).unwrap_or_else(|| NO_CONTENT.to_string()),
        rating: first_text(card, &s.rating).unwrap_or_else(|| NO_RATING.to_string()),
        author: first_text(card, &s.author).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        date: first_text(card, &s.date).unwrap_or_else(|| NO_DATE.to_string()),
        helpful,
        unhelpful,
    }
}

/// `"12 out of 15 found this helpful."` ⇒ `(12, 3)`
pub fn parse_helpful_sentence(text: &str) -> Option<(u64, u64)> {
    let caps = HELPFUL_SENTENCE.captures(text)?;
    let helpful = parse_vote_count(&caps[1]);
    let total = parse_vote_count(&caps[2]);
    Some((helpful, total.saturating_sub(helpful)))
}

/// Whitespace-normalized text of the first match, `None` when absent or blank
fn first_text(scope: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    let element = scope.select(sel).next()?;
    let text = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <ul>
          <li class="ipc-metadata-list-summary-item">
            <a class="ipc-title-link-wrapper" href="/title/tt15239678/?ref_=sr_t_1">
              <h3 class="ipc-title__text">1. Dune: Part Two</h3>
            </a>
          </li>
          <li class="ipc-metadata-list-summary-item">
            <h3 class="ipc-title__text">2. No Link Here</h3>
          </li>
          <li class="ipc-metadata-list-summary-item">
            <a class="ipc-title-link-wrapper" href="/title/tt17526714/"></a>
          </li>
        </ul>
    "#;

    #[test]
    fn test_parse_movie_cards() {
        let cards = parse_movie_cards(LISTING);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].title.as_deref(), Some("1. Dune: Part Two"));
        assert_eq!(cards[0].href.as_deref(), Some("/title/tt15239678/?ref_=sr_t_1"));
        assert_eq!(cards[1].href, None);
        assert_eq!(cards[2].title, None);
    }

    #[test]
    fn test_parse_full_page_review() {
        let markup = r#"
            <article class="user-review-item">
              <span class="ipc-rating-star--rating">8</span>
              <span data-testid="review-summary">A feast</span>
              <div class="ipc-html-content-inner-div">Loved <b>every</b> minute.</div>
              <a data-testid="author-link">cinephile42</a>
              <ul><li class="review-date">Oct 7, 2024</li></ul>
              <span class="ipc-voting__label__count--up">1.2K</span>
              <span class="ipc-voting__label__count--down">38</span>
            </article>
        "#;
        let reviews = parse_review_cards(markup, LayoutVariant::FullPage);
        assert_eq!(reviews.len(), 1);
        let r = &reviews[0];
        assert_eq!(r.rating, "8");
        assert_eq!(r.summary, "A feast");
        assert_eq!(r.body, "Loved every minute.");
        assert_eq!(r.author, "cinephile42");
        assert_eq!(r.date, "Oct 7, 2024");
        assert_eq!(r.helpful, 1200);
        assert_eq!(r.unhelpful, 38);
    }

    #[test]
    fn test_parse_incremental_review() {
        let markup = r#"
            <div class="lister-item mode-detail imdb-user-review">
              <span class="rating-other-user-rating"><span>6</span><span>/10</span></span>
              <a class="title" href="/review/rw1/">Decent</a>
              <span class="display-name-link"><a href="/user/ur1/">moviegoer</a></span>
              <span class="review-date">7 October 2024</span>
              <div class="text show-more__control">It was fine.</div>
              <div class="actions text-muted">12 out of 15 found this helpful. Was this review helpful?</div>
            </div>
        "#;
        let reviews = parse_review_cards(markup, LayoutVariant::Incremental);
        assert_eq!(reviews.len(), 1);
        let r = &reviews[0];
        assert_eq!(r.rating, "6");
        assert_eq!(r.summary, "Decent");
        assert_eq!(r.body, "It was fine.");
        assert_eq!(r.author, "moviegoer");
        assert_eq!(r.date, "7 October 2024");
        assert_eq!(r.helpful, 12);
        assert_eq!(r.unhelpful, 3);
    }

    #[test]
    fn test_missing_fields_get_sentinels_individually() {
        let markup = r#"
            <article class="user-review-item">
              <span data-testid="review-summary">Only a summary</span>
            </article>
            <article class="user-review-item">
              <a data-testid="author-link">only_author</a>
              <span class="ipc-rating-star--rating">3</span>
            </article>
        "#;
        let reviews = parse_review_cards(markup, LayoutVariant::FullPage);
        assert_eq!(reviews.len(), 2);

        assert_eq!(reviews[0].summary, "Only a summary");
        assert_eq!(reviews[0].body, NO_CONTENT);
        assert_eq!(reviews[0].rating, NO_RATING);
        assert_eq!(reviews[0].author, UNKNOWN_AUTHOR);
        assert_eq!(reviews[0].date, NO_DATE);
        assert_eq!(reviews[0].helpful, 0);
        assert_eq!(reviews[0].unhelpful, 0);

        assert_eq!(reviews[1].summary, NO_SUMMARY);
        assert_eq!(reviews[1].author, "only_author");
        assert_eq!(reviews[1].rating, "3");
    }

    #[test]
    fn test_wrong_layout_finds_nothing() {
        let markup = r#"<article class="user-review-item"><span data-testid="review-summary">x</span></article>"#;
        assert!(parse_review_cards(markup, LayoutVariant::Incremental).is_empty());
        assert_eq!(parse_review_cards(markup, LayoutVariant::FullPage).len(), 1);
    }

    #[test]
    fn test_helpful_sentence() {
        assert_eq!(
            parse_helpful_sentence("1,204 out of 1,300 found this helpful."),
            Some((1204, 96))
        );
        assert_eq!(parse_helpful_sentence("Was this review helpful?"), None);
    }

    #[test]
    fn test_layout_other() {
        assert_eq!(LayoutVariant::FullPage.other(), LayoutVariant::Incremental);
        assert_eq!(LayoutVariant::Incremental.other(), LayoutVariant::FullPage);
    }
}
