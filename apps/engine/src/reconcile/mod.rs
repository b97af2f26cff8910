pub mod canonical;
pub mod locator;
pub mod repair;
pub mod score;
pub mod sync;
pub mod verify;
