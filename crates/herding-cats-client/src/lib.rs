//! HerdingCats Client - Sessions, explorers and loaders for open data catalogues
//!
//! This crate talks to catalogue APIs over HTTP:
//!
//! - [`session`] - resolving a catalogue and checking it answers
//! - [`ckan`] - CKAN portals
//! - [`opendatasoft`] - OpenDataSoft portals
//! - [`french_gouv`] - data.gouv.fr
//! - [`nomis`] - ONS Nomis
//! - [`loader`] - downloading resources into frames, SQL tables or storage
//!
//! # Overview
//!
//! Open a [`CatSession`], hand it to the explorer for its platform, then pass
//! what the explorer returns to the matching loader.

pub mod ckan;
pub mod french_gouv;
pub mod http;
pub mod loader;
pub mod nomis;
pub mod opendatasoft;
pub mod session;

// Re-export main client types
pub use ckan::CkanCatExplorer;
pub use french_gouv::FrenchGouvCatExplorer;
pub use http::HttpFetcher;
pub use loader::{
    CkanLoader, FetchedResource, FrenchGouvLoader, OnsNomisLoader, OpenDataSoftLoader,
    ResourceLoader,
};
pub use nomis::OnsNomisCatExplorer;
pub use opendatasoft::OpenDataSoftCatExplorer;
pub use session::{CatSession, CatalogueSource};
