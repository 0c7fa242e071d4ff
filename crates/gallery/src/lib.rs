//! Photo catalog for the parallax viewer.
//!
//! A catalog is a TOML file listing photos with their color image, matching
//! depth map, and display aspect ratio:
//!
//! ```toml
//! [[photo]]
//! slug = "harbour"
//! title = "Harbour at dusk"
//! src = "images/harbour.jpg"
//! depth_src = "images/harbour-depth.png"
//! aspect = 1.5
//! ```
//!
//! Relative sources resolve against the directory holding the catalog file;
//! `http(s)://` and `file://` sources pass through untouched.

mod catalog;
mod photo;

pub use catalog::{CatalogError, PhotoCatalog};
pub use photo::Photo;
