//! Core types for the storybook service.
//!
//! This crate provides the records shared by the webhook service, the store,
//! and the client SDK:
//!
//! - **Identifiers**: `UserId`, `TemplateId`, `StoryId`, `JobId`
//! - **User stories**: `UserStory`, `StoryStatus`, `PaymentStatus`, `BookDetails`
//! - **Catalog**: `StoryTemplate`, `StoryBasicInfo`, `StoryDetails`, `WeeklyFavorite`
//! - **Photo transforms**: `Transformation`, `TransformStatus`, `TransformResolution`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod story;
pub mod template;
pub mod transform;

pub use error::{Result, StorybookError};
pub use ids::{validate_segment, IdError, JobId, StoryId, TemplateId, UserId, RESERVED_KEY_CHARS};
pub use story::{
    BookDetails, ChildGender, PaymentDetails, PaymentStatus, Personalization, StoryStatus,
    UserStory,
};
pub use template::{StoryBasicInfo, StoryDetails, StoryTemplate, WeeklyFavorite};
pub use transform::{
    TransformResolution, TransformStatus, Transformation, DEFAULT_TRANSFORM_ERROR,
};
