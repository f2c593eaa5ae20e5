//! Embedded Quote Repository
//!
//! The corpus is compiled into the binary and parsed once; it is never
//! written after construction.

use std::sync::Arc;

use rand::Rng;

use crate::domain::repository::QuoteRepository;
use crate::error::QuoteError;

const CORPUS: &str = include_str!("quotes.txt");

/// In-memory quote corpus
#[derive(Debug, Clone)]
pub struct EmbeddedQuotes {
    quotes: Arc<[String]>,
}

impl EmbeddedQuotes {
    /// The corpus shipped with the crate
    pub fn new() -> Self {
        Self::from_text(CORPUS)
    }

    /// One quote per non-blank line, trimmed
    pub fn from_text(text: &str) -> Self {
        let quotes: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            quotes: quotes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl Default for EmbeddedQuotes {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteRepository for EmbeddedQuotes {
    async fn get_quote(&self) -> Result<String, QuoteError> {
        if self.quotes.is_empty() {
            return Err(QuoteError::Empty);
        }
        let idx = rand::rng().random_range(0..self.quotes.len());
        Ok(self.quotes[idx].clone())
    }
}
