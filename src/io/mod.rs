//! File formats - read discovery, Kraken2 reports, metadata and exported tables

pub mod export;
pub mod fastq;
pub mod metadata;
pub mod report;
