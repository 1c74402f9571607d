use std::collections::HashSet;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Name the asset analyzer is registered under in every index
pub const ANALYZER_NAME: &str = "asset_text";

/// Splits on anything that is not alphanumeric, lowercases, drops overlong tokens
pub fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .build()
}

/// Terms of `text` as the index sees them
pub fn tokenize(text: &str) -> Vec<String> {
    let mut analyzer = analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut terms = Vec::new();
    while stream.advance() {
        terms.push(stream.token().text.clone());
    }
    terms
}

/// Query terms in first-seen order, without repeats
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut terms = tokenize(query);
    let mut seen = HashSet::new();
    terms.retain(|term| seen.insert(term.clone()));
    terms
}
