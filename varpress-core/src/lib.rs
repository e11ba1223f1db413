#![doc = "varpress-core: core logic library for varpress."]

//! This crate contains all data models and pipeline logic for varpress:
//! the generation ledger, Markdown-to-HTML transforms, token resolution and
//! the course/page publishing pipeline. Network clients (REST, browser
//! session, container exec) live in the CLI crate and plug in through the
//! traits in [`contract`].
//!
//! # Usage
//! Add this as a dependency for all shared ledger, transform and publish code.

pub mod contract;
pub mod ledger;
pub mod markup;
pub mod publish;
pub mod token;
