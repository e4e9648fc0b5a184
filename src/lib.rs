//! # alt-scout
//!
//! Image-reference maintenance for markdown and component content: find
//! images nobody references any more, and backfill missing alt text with a
//! local vision model.
//!
//! # Architecture: Shared Front, Two Flows
//!
//! ```text
//!                      ┌──► analyze ──► cleanup report
//! discover ─► extract ─┤
//!        (resolve)     └──► caption ──► mutate ──► content files rewritten
//! ```
//!
//! Discovery, extraction, and path resolution are shared. The cleanup flow
//! only reads and reports; the alt-text flow is the only code that writes,
//! and it writes nothing but caption fields.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Content files from a directory or a `*`/`**` pattern |
//! | [`dialect`] | Line matchers, caption decoding and escaping for the four embedding syntaxes |
//! | [`extract`] | File text → line-addressed [`types::ImageReference`]s, language detection |
//! | [`resolve`] | Locator → existing file on disk |
//! | [`analyze`] | Folder inference and the unused-image report |
//! | [`caption`] | Image preparation, vision client, scratch directory |
//! | [`imaging`] | Pure-Rust identify and resize behind a mockable backend |
//! | [`mutate`] | Dialect-aware line rewriting, one write per file |
//! | [`session`] | The alt-text run: batch and interactive loops |
//! | [`signals`] | SIGINT/SIGTERM cleanup and exit codes |
//! | [`config`] | `alt-scout.toml` loading, validation, merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Line-Based Matching
//!
//! Every dialect is matched one line at a time. A reference is addressed by
//! file, line, dialect, and its occurrence among that dialect's matches on
//! the line, which is exactly what the mutator needs to rewrite it. Captions
//! that span lines are not supported.
//!
//! ## One Write Per File
//!
//! Captions for a file are applied to a single in-memory copy of its lines.
//! A second reference in the same file can never overwrite the first one's
//! change with stale content.
//!
//! ## Nothing Is Deleted
//!
//! The cleanup report lists unused images, with or without `--dry-run`.
//! The usage test is a substring match in both directions, which prefers
//! keeping an unused image over flagging a used one.

pub mod analyze;
pub mod caption;
pub mod config;
pub mod dialect;
pub mod discover;
pub mod extract;
pub mod imaging;
pub mod mutate;
pub mod output;
pub mod resolve;
pub mod session;
pub mod signals;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
