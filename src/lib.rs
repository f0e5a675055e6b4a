//! Chatter Engine — text generation for scripted conversational agents.
//!
//! Two independent engines: a template grammar that expands recursive
//! `#symbol#` / `[key:value]` rules into sentences, and an n-gram
//! statistical language model that samples text, scores likelihood, and
//! flags atypical input with a held-out z-score estimator.

pub mod core;
