// Core modules implementing PDF reading, value cleaning, and table extraction.
pub mod error;
pub mod lines;
pub mod payments;
pub mod pdf;
pub mod report;
pub mod summary;
pub mod values;
pub mod weeks;
