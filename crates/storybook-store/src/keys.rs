//! Record keys.
//!
//! A `RecordKey` is a `/`-separated logical path such as
//! `userStories/{userId}/{storyId}`. Keys double as subscription prefixes: a
//! key is "within" a prefix when it equals it or continues it with `/`.

use std::fmt;

use serde::{Deserialize, Serialize};
use storybook_core::{validate_segment, JobId, StoryId, TemplateId, UserId};

use crate::error::{Result, StoreError};
use crate::schema::paths;

/// A validated logical record path.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey(String);

impl RecordKey {
    /// Build a key from path segments, validating each one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` if there are no segments or any
    /// segment is empty or contains a reserved character.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            validate_segment(segment)?;
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
        }
        if path.is_empty() {
            return Err(StoreError::InvalidKey("empty path".into()));
        }
        Ok(Self(path))
    }

    /// Parse a `/`-separated path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidKey` for empty or malformed paths.
    pub fn parse(path: &str) -> Result<Self> {
        Self::from_segments(path.split('/'))
    }

    // Identifiers are validated segments, so the constructors below cannot fail.
    fn join(segments: &[&str]) -> Self {
        Self(segments.join("/"))
    }

    /// `storyTemplates/{templateId}`
    #[must_use]
    pub fn story_template(template_id: &TemplateId) -> Self {
        Self::join(&[paths::STORY_TEMPLATES, template_id.as_str()])
    }

    /// `userStories/{userId}/{storyId}`
    #[must_use]
    pub fn user_story(user_id: &UserId, story_id: &StoryId) -> Self {
        Self::join(&[paths::USER_STORIES, user_id.as_str(), story_id.as_str()])
    }

    /// `transformations/{userId}/{jobId}`
    #[must_use]
    pub fn transformation(user_id: &UserId, job_id: &JobId) -> Self {
        Self::join(&[paths::TRANSFORMATIONS, user_id.as_str(), job_id.as_str()])
    }

    /// `catalog/weeklyFavorite`
    #[must_use]
    pub fn weekly_favorite() -> Self {
        Self::join(&[paths::CATALOG, paths::WEEKLY_FAVORITE])
    }

    /// Prefix of every catalog entry.
    #[must_use]
    pub fn story_templates() -> Self {
        Self::join(&[paths::STORY_TEMPLATES])
    }

    /// Prefix of one user's stories.
    #[must_use]
    pub fn user_stories(user_id: &UserId) -> Self {
        Self::join(&[paths::USER_STORIES, user_id.as_str()])
    }

    /// Prefix of one user's transform jobs.
    #[must_use]
    pub fn transformations(user_id: &UserId) -> Self {
        Self::join(&[paths::TRANSFORMATIONS, user_id.as_str()])
    }

    /// The full path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The last path segment (the record id for leaf keys).
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether this key equals `prefix` or lies below it.
    #[must_use]
    pub fn is_within(&self, prefix: &RecordKey) -> bool {
        match self.0.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Storage encoding used by the `RocksDB` backend.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordKey {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RecordKey> for String {
    fn from(key: RecordKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn layout_matches_logical_paths() {
        let story = StoryId::new("t1_u1_42").unwrap();
        assert_eq!(
            RecordKey::user_story(&user(), &story).as_str(),
            "userStories/u1/t1_u1_42"
        );
        assert_eq!(
            RecordKey::story_template(&TemplateId::new("t1").unwrap()).as_str(),
            "storyTemplates/t1"
        );
        assert_eq!(
            RecordKey::transformation(&user(), &JobId::new("job-1").unwrap()).as_str(),
            "transformations/u1/job-1"
        );
        assert_eq!(RecordKey::weekly_favorite().as_str(), "catalog/weeklyFavorite");
    }

    #[test]
    fn prefix_matching_respects_segment_boundaries() {
        let prefix = RecordKey::user_stories(&user());
        let inside = RecordKey::parse("userStories/u1/s1").unwrap();
        let sibling = RecordKey::parse("userStories/u10/s1").unwrap();

        assert!(inside.is_within(&prefix));
        assert!(prefix.is_within(&prefix));
        assert!(!sibling.is_within(&prefix));
    }

    #[test]
    fn parse_rejects_bad_paths() {
        assert!(RecordKey::parse("").is_err());
        assert!(RecordKey::parse("a//b").is_err());
        assert!(RecordKey::parse("a/b.c").is_err());
        assert!(RecordKey::parse("a/b").is_ok());
    }

    #[test]
    fn last_segment_is_record_id() {
        let key = RecordKey::parse("storyTemplates/t9").unwrap();
        assert_eq!(key.last_segment(), "t9");
    }
}
