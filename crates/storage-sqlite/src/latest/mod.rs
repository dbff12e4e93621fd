//! Latest-quote store backed by the `latest_quotes` table.

mod model;
mod repository;

pub use model::LatestQuoteDB;
pub use repository::LatestQuoteRepository;
