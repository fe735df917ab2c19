//! Output generation.
//!
//! # Submodules
//!
//! - [`csv`]: Writes per-country trending CSVs and the normalized table
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── USvideos.csv
//! ├── GBvideos.csv
//! └── ...
//! ```

pub mod csv;
