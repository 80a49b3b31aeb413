pub mod certificates;
pub mod records;
pub mod verify;
