//! flyerscout: promotional flyer discovery and catalog ingestion.
//!
//! Finds flyer PDFs on retailer sites, validates and stores them, infers
//! store metadata and uploads them to a flyer catalog service.

pub mod config;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;
