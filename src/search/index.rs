//! Tantivy index over [`IndexedAsset`] projections and tiered ranking
//!
//! Each query term is matched through three tiers, each a boosted disjunction
//! over the searchable fields:
//!
//! | Tier       | Max edits | Exact prefix | Boost |
//! |------------|-----------|--------------|-------|
//! | very fuzzy | 1         | 2 chars      | 2     |
//! | fuzzy      | 1         | 4 chars      | 4     |
//! | exact      | 0         | whole term   | 6     |
//!
//! A field hit scores a constant `field weight * tier boost`; term frequency
//! and rarity play no part. Fuzzy candidates are streamed from the term
//! dictionary starting at the tier's required prefix. Ties are broken on the
//! `inv_popularity` fast field, then on the game id.

use crate::model::IndexedAsset;
use crate::search::tokenizer::{analyzer, tokenize_query, ANALYZER_NAME};
use crate::search::IndexError;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::RamDirectory;
use tantivy::query::{BooleanQuery, BoostQuery, ConstScoreQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field as SchemaField, IndexRecordOption, Schema, Term, TextFieldIndexing, TextOptions, Value,
    FAST, STORED, STRING,
};
use tantivy::{
    doc, Directory, Index, IndexReader, IndexWriter, ReloadPolicy, Score, Searcher,
    TantivyDocument,
};

const WRITER_MEMORY_BYTES: usize = 50_000_000;

const GAME_ID: &str = "game_id";
const TITLE: &str = "title";
const DESCRIPTION: &str = "description";
const AUTHOR: &str = "author";
const INV_POPULARITY: &str = "inv_popularity";

/// Searchable fields of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Description,
    Author,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Title, Field::Description, Field::Author];

    pub fn weight(self) -> Score {
        match self {
            Field::Title => 3.0,
            Field::Description => 2.0,
            Field::Author => 1.0,
        }
    }
}

/// Ranking tiers, combined with OR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    VeryFuzzy,
    Fuzzy,
    Exact,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::VeryFuzzy, Tier::Fuzzy, Tier::Exact];

    pub fn boost(self) -> Score {
        match self {
            Tier::VeryFuzzy => 2.0,
            Tier::Fuzzy => 4.0,
            Tier::Exact => 6.0,
        }
    }

    fn max_edits(self) -> usize {
        match self {
            Tier::VeryFuzzy | Tier::Fuzzy => 1,
            Tier::Exact => 0,
        }
    }

    fn prefix_len(self) -> usize {
        match self {
            Tier::VeryFuzzy => 2,
            Tier::Fuzzy => 4,
            Tier::Exact => 0,
        }
    }
}

/// A ranked query hit
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub game_id: String,
    pub score: Score,
    pub inv_popularity: i64,
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    game_id: SchemaField,
    title: SchemaField,
    description: SchemaField,
    author: SchemaField,
}

impl Fields {
    fn text(&self, field: Field) -> SchemaField {
        match field {
            Field::Title => self.title,
            Field::Description => self.description,
            Field::Author => self.author,
        }
    }
}

fn build_schema() -> Schema {
    let text = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(ANALYZER_NAME)
            .set_index_option(IndexRecordOption::Basic),
    );

    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(GAME_ID, STRING | STORED);
    schema_builder.add_text_field(TITLE, text.clone());
    schema_builder.add_text_field(DESCRIPTION, text.clone());
    schema_builder.add_text_field(AUTHOR, text);
    schema_builder.add_i64_field(INV_POPULARITY, FAST | STORED);
    schema_builder.build()
}

fn fields_from_schema(schema: &Schema) -> Result<Fields, IndexError> {
    let get = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| IndexError::Schema(name.to_string()))
    };
    Ok(Fields {
        game_id: get(GAME_ID)?,
        title: get(TITLE)?,
        description: get(DESCRIPTION)?,
        author: get(AUTHOR)?,
    })
}

/// Immutable search index, rebuilt wholesale on every refresh
pub struct SearchIndex {
    reader: IndexReader,
    fields: Fields,
    doc_count: usize,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("doc_count", &self.doc_count)
            .finish()
    }
}

impl SearchIndex {
    /// Builds an in-memory index over `docs`
    pub fn build(docs: &[IndexedAsset]) -> Result<Self, IndexError> {
        Self::populate(Index::create_in_ram(build_schema()), docs)
    }

    /// Builds an index over `docs` stored in `dir`, which must not hold one yet
    pub fn build_in_dir(dir: &Path, docs: &[IndexedAsset]) -> Result<Self, IndexError> {
        fs::create_dir_all(dir)?;
        Self::populate(Index::create_in_dir(dir, build_schema())?, docs)
    }

    /// Copies an index directory written by [`SearchIndex::build_in_dir`] into memory
    ///
    /// `dir` may be removed once this returns.
    pub fn load_from_dir(dir: &Path) -> Result<Self, IndexError> {
        let ram = RamDirectory::create();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if !entry.file_type()?.is_file() || name.to_string_lossy().ends_with(".lock") {
                continue;
            }
            ram.atomic_write(Path::new(&name), &fs::read(entry.path())?)?;
        }

        let directory: Box<dyn Directory> = Box::new(ram);
        Self::open(Index::open(directory)?)
    }

    fn populate(index: Index, docs: &[IndexedAsset]) -> Result<Self, IndexError> {
        index.tokenizers().register(ANALYZER_NAME, analyzer());
        let schema = index.schema();
        let fields = fields_from_schema(&schema)?;
        let inv_popularity = schema
            .get_field(INV_POPULARITY)
            .map_err(|_| IndexError::Schema(INV_POPULARITY.to_string()))?;

        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for asset in docs {
            writer.add_document(doc!(
                fields.game_id => asset.game_id.clone(),
                fields.title => asset.title.clone(),
                fields.description => asset.description.clone(),
                fields.author => asset.author.clone(),
                inv_popularity => asset.inv_popularity,
            ))?;
        }
        writer.commit()?;
        writer.wait_merging_threads()?;

        Self::open(index)
    }

    fn open(index: Index) -> Result<Self, IndexError> {
        index.tokenizers().register(ANALYZER_NAME, analyzer());
        let fields = fields_from_schema(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let doc_count = usize::try_from(reader.searcher().num_docs()).unwrap_or(usize::MAX);

        Ok(Self {
            reader,
            fields,
            doc_count,
        })
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Ranks every document matching `query`
    ///
    /// Ordered by score descending, then inverse popularity ascending, then
    /// game id ascending.
    pub fn search(&self, query: &str) -> Result<Vec<Hit>, IndexError> {
        let terms = tokenize_query(query);
        if terms.is_empty() || self.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for term in &terms {
            for tier in Tier::ALL {
                if let Some(query) = self.tier_query(&searcher, term, tier)? {
                    clauses.push((Occur::Should, query));
                }
            }
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let top_docs = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(self.doc_count))?;

        let popularity = searcher
            .segment_readers()
            .iter()
            .map(|segment| segment.fast_fields().i64(INV_POPULARITY))
            .collect::<Result<Vec<_>, _>>()?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let stored: TantivyDocument = searcher.doc(address)?;
            let game_id = stored
                .get_first(self.fields.game_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let inv_popularity = popularity[address.segment_ord as usize]
                .first(address.doc_id)
                .unwrap_or(i64::MAX);
            hits.push(Hit {
                game_id,
                score,
                inv_popularity,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.inv_popularity.cmp(&b.inv_popularity))
                .then_with(|| a.game_id.cmp(&b.game_id))
        });
        Ok(hits)
    }

    /// `tier boost * (sum of field weight over fields holding a candidate)`
    fn tier_query(
        &self,
        searcher: &Searcher,
        term: &str,
        tier: Tier,
    ) -> Result<Option<Box<dyn Query>>, IndexError> {
        let mut per_field: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for field in Field::ALL {
            let schema_field = self.fields.text(field);
            let candidates = candidates(searcher, schema_field, term, tier)?;
            if candidates.is_empty() {
                continue;
            }

            let any_candidate: Vec<(Occur, Box<dyn Query>)> = candidates
                .iter()
                .map(|candidate| {
                    let query: Box<dyn Query> = Box::new(TermQuery::new(
                        Term::from_field_text(schema_field, candidate),
                        IndexRecordOption::Basic,
                    ));
                    (Occur::Should, query)
                })
                .collect();

            let matched = ConstScoreQuery::new(Box::new(BooleanQuery::new(any_candidate)), 1.0);
            let weighted: Box<dyn Query> = Box::new(BoostQuery::new(Box::new(matched), field.weight()));
            per_field.push((Occur::Should, weighted));
        }

        if per_field.is_empty() {
            return Ok(None);
        }
        let boosted: Box<dyn Query> =
            Box::new(BoostQuery::new(Box::new(BooleanQuery::new(per_field)), tier.boost()));
        Ok(Some(boosted))
    }
}

/// Dictionary terms of `field` that `term` reaches in `tier`
fn candidates(
    searcher: &Searcher,
    field: SchemaField,
    term: &str,
    tier: Tier,
) -> Result<BTreeSet<String>, IndexError> {
    let mut found = BTreeSet::new();
    if tier.max_edits() == 0 {
        found.insert(term.to_string());
        return Ok(found);
    }

    let prefix = char_prefix(term, tier.prefix_len());
    let query: Vec<char> = term.chars().collect();

    for segment in searcher.segment_readers() {
        let inverted = segment.inverted_index(field)?;
        let mut stream = inverted.terms().range().ge(prefix.as_bytes()).into_stream()?;
        while stream.advance() {
            let key = stream.key();
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let Ok(candidate) = std::str::from_utf8(key) else {
                continue;
            };
            if within_edits(&query, candidate, tier.max_edits()) {
                found.insert(candidate.to_string());
            }
        }
    }

    Ok(found)
}

/// First `n` chars of `term`, or all of it when shorter
fn char_prefix(term: &str, n: usize) -> &str {
    match term.char_indices().nth(n) {
        Some((end, _)) => &term[..end],
        None => term,
    }
}

/// Levenshtein distance between `query` and `candidate` is at most `max`
fn within_edits(query: &[char], candidate: &str, max: usize) -> bool {
    let candidate: Vec<char> = candidate.chars().collect();
    if query.len().abs_diff(candidate.len()) > max {
        return false;
    }

    let mut prev: Vec<usize> = (0..=candidate.len()).collect();
    let mut curr = vec![0; candidate.len() + 1];
    for (i, q) in query.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, c) in candidate.iter().enumerate() {
            let cost = usize::from(q != c);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return false;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[candidate.len()] <= max
}
