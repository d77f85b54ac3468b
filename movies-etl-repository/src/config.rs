//! Configuration types for the search index.

use movies_etl_shared::EntityKind;

/// Names of the three target indexes and the bulk request size limit.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Index holding film documents.
    pub movies_index: String,
    /// Index holding genre documents.
    pub genres_index: String,
    /// Index holding person documents.
    pub persons_index: String,
    /// Maximum number of documents sent in a single bulk request.
    ///
    /// Larger loads are split into consecutive requests.
    pub max_batch_size: usize,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            movies_index: "movies".to_string(),
            genres_index: "genres".to_string(),
            persons_index: "persons".to_string(),
            max_batch_size: 1000,
        }
    }
}

impl SearchIndexConfig {
    /// The index that holds documents of the given kind.
    pub fn index_for(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Persons => &self.persons_index,
            EntityKind::Genres => &self.genres_index,
            EntityKind::FilmWorks => &self.movies_index,
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_names() {
        let config = SearchIndexConfig::default();
        assert_eq!(config.index_for(EntityKind::FilmWorks), "movies");
        assert_eq!(config.index_for(EntityKind::Genres), "genres");
        assert_eq!(config.index_for(EntityKind::Persons), "persons");
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        let config = SearchIndexConfig::default().with_max_batch_size(0);
        assert_eq!(config.max_batch_size, 1);
    }
}
