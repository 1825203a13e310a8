pub mod games;
pub mod models;
