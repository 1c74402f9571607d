use serde::{Deserialize, Serialize};

/// A single asset harvested from the remote listing
///
/// `game_id` is the primary key: a later write with the same id replaces the
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub game_id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub link: String,
    pub thumb_url: String,

    /// Inverse popularity: the listing page the asset was found on.
    /// Lower is more popular.
    pub inv_popularity: i64,
}

impl Asset {
    /// Projects this asset onto the fields the search index needs
    pub fn to_indexed(&self) -> IndexedAsset {
        IndexedAsset {
            game_id: self.game_id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            inv_popularity: self.inv_popularity,
        }
    }
}

/// Lean projection of an [`Asset`] used for text search and ranking
///
/// Link and thumbnail are absent; hits are resolved back to the
/// full asset through the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedAsset {
    pub game_id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub inv_popularity: i64,
}

impl From<&Asset> for IndexedAsset {
    fn from(asset: &Asset) -> Self {
        asset.to_indexed()
    }
}
