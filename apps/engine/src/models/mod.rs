pub mod analysis;
pub mod canonical;
