//! Domain types, pricing, documents, and the clients for every external
//! service the quotation workflow depends on.

pub(crate) mod api;
pub(crate) mod catalog;
pub(crate) mod commands;
pub(crate) mod models;
pub(crate) mod quotes;
pub(crate) mod templates;
pub(crate) mod webhook;
