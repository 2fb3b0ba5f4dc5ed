pub mod bins;
pub mod distributions;
pub mod error;
pub mod generator;
pub mod orientation;
pub mod output;
pub mod settings;
pub mod statsgen;
pub mod symmetry;
pub mod texture;
