pub mod collection;
pub mod movie;
pub mod review;

pub use collection::MovieReviewCollection;
pub use movie::{Movie, RawMovieCard, MISSING_IDENTIFIER};
pub use review::Review;
