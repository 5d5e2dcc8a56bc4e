//! Client for the newsletter reader API.

pub mod client;

pub use client::{ApiFailure, Article, ArticleSummary, NewsletterClient, SdkResult};
