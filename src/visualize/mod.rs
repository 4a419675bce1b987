//! Visualization - stacked abundance bar charts

pub mod plot;
