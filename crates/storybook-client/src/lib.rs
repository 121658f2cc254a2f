//! Storybook Client SDK.
//!
//! This crate provides a client library for the web app's server side to
//! drive the storybook service: start checkouts, run photo transforms and
//! read the catalog and a user's stories.
//!
//! # Example
//!
//! ```no_run
//! use storybook_client::{CheckoutRequest, StorybookClient};
//!
//! # async fn example() -> Result<(), storybook_client::ClientError> {
//! let client = StorybookClient::new("http://storybook:8080", "shared-api-key")?;
//!
//! let checkout = client
//!     .create_checkout_session(&CheckoutRequest {
//!         user_id: "u1".into(),
//!         user_email: "parent@example.com".into(),
//!         template_id: "t1".into(),
//!         child_name: Some("Mia".into()),
//!         ..CheckoutRequest::default()
//!     })
//!     .await?;
//!
//! println!("Redirect to {}", checkout.checkout_url);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, StorybookClient};
pub use error::ClientError;
pub use types::*;
