//! Store layout: logical path roots and `RocksDB` column families.

/// Top-level path segments of the logical record tree.
pub mod paths {
    /// `storyTemplates/{templateId}`
    pub const STORY_TEMPLATES: &str = "storyTemplates";

    /// `userStories/{userId}/{storyId}`
    pub const USER_STORIES: &str = "userStories";

    /// `transformations/{userId}/{jobId}`
    pub const TRANSFORMATIONS: &str = "transformations";

    /// `catalog/...` bookkeeping records.
    pub const CATALOG: &str = "catalog";

    /// `catalog/weeklyFavorite`
    pub const WEEKLY_FAVORITE: &str = "weeklyFavorite";
}

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// All records, keyed by their UTF-8 logical path.
    pub const RECORDS: &str = "records";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::RECORDS]
}
