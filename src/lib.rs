//! # Roster
//!
//! A local-first store of conference attendee profiles with a natural-language
//! search that is delegated to a hosted language model.
//!
//! Profiles are JSON records captured from professional-network pages. They
//! are kept in one SQLite-backed slot, filtered and sorted locally, and handed
//! in full to a ranking proxy when the user asks a free-text question. The
//! proxy's answer is validated, thresholded and overlaid on the profile cards
//! as scores and per-field match badges.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ add/import  │──▶│ ProfileStore │──▶│  SQLite  │
//! │ seed fetch  │   │ (url dedup)  │   │  slots   │
//! └─────────────┘   └──────┬───────┘   └──────────┘
//!                          │
//!          ┌───────────────┼────────────────┐
//!          ▼               ▼                ▼
//!    ┌──────────┐   ┌─────────────┐   ┌──────────┐
//!    │  filter  │   │   search    │──▶│ ranking  │
//!    │  + sort  │   │ orchestrator│   │  proxy   │
//!    └────┬─────┘   └──────┬──────┘   └──────────┘
//!         └───────┬────────┘
//!                 ▼
//!          ┌─────────────┐   ┌───────────────┐
//!          │   render    │──▶│ CLI / HTTP API │
//!          │ projection  │   └───────────────┘
//!          └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! roster init
//! roster import attendees.json
//! roster list --school "Yale University" --sort recent
//! roster search "people who worked at Palantir"
//! roster serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Profile and match types |
//! | [`slots`] | Durable named storage slots |
//! | [`store`] | The profile collection and its dedup rule |
//! | [`filter`] | Text/school filter and sort |
//! | [`render`] | View model, HTML and terminal rendering |
//! | [`search`] | Remote ranking orchestration |
//! | [`seed`] | First-run seed fetch |
//! | [`sync`] | Batched remote backup |
//! | [`export`] | Export and import files |
//! | [`server`] | JSON HTTP API |
//! | [`migrate`] | Schema creation |

pub mod attendees;
pub mod config;
pub mod export;
pub mod filter;
pub mod migrate;
pub mod models;
pub mod render;
pub mod search;
pub mod seed;
pub mod server;
pub mod slots;
pub mod stats;
pub mod store;
pub mod sync;

pub use export::export_file_name;
