//! Integration layers for the two systems `skillkit` coordinates.
//!
//! - [`git`]: Local working copies (the registry clone and skill submodules)
//! - [`github`]: Forks, pull requests and commit lookup on GitHub
//! - [`github_curl`]: Curl-based HTTP client for making GitHub API requests
//!
//! [`git::GitOps`] and [`github::GithubOps`] are mocked in unit tests.

pub mod git;
pub mod github;
pub mod github_curl;
