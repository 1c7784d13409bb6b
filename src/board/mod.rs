//! Board module for Tavern.
//!
//! This module provides the content store:
//! - Boards grouped into display sections
//! - Topics created atomically with their first post
//! - Replies that bump their topic
//! - Paginated listings and aggregate counts for index pages

mod pagination;
mod store;
mod types;

pub use pagination::{total_pages, Page, PageRequest};
pub use store::ContentStore;
pub use types::{Board, BoardSummary, LastPostSummary, Post, Topic};
