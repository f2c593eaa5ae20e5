//! Repository Traits
//!
//! Interfaces for the protected resource. Implementation is in the infra layer.

use crate::error::QuoteError;

/// Quote repository trait
#[trait_variant::make(QuoteRepository: Send)]
pub trait LocalQuoteRepository {
    /// Pick one quote to hand out
    async fn get_quote(&self) -> Result<String, QuoteError>;
}
