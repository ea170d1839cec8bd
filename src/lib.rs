//! # apilot
//!
//! An assistant that routes free-text questions to the best-matching HTTP API
//! and answers them through a plan/act agent loop.
//!
//! This library provides:
//! - Embedding-based retrieval mapping a query to one API tool descriptor
//! - Credential resolution for `{NAME}` placeholders in auth templates
//! - OpenAPI spec reduction and an LLM-driven planning agent
//! - A two-state plan/act control loop with streamed progress events
//! - An HTTP API for chat turns (SSE streaming)
//!
//! ## Architecture
//!
//! One chat turn flows as:
//! 1. The control loop calls the LLM with the conversation and the `api_tool` schema
//! 2. When the model requests the tool, the executor picks the nearest API by
//!    embedding similarity, resolves credentials, and loads the OpenAPI spec
//! 3. Exploratory questions get a templated description; real ones are
//!    delegated to the planning agent, which calls the API and summarizes
//! 4. The result feeds back into the loop until the model answers directly
//!
//! ## Example
//!
//! ```rust,ignore
//! use apilot::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod executor;
pub mod index;
pub mod llm;
pub mod openapi;
pub mod planner;
pub mod session;
pub mod tools;

pub use config::Config;
