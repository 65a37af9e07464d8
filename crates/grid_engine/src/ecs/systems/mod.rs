//! Systems operating on registry components

pub mod grid;

pub use grid::GridSystem;
