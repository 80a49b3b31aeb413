pub mod record;
pub mod verification;
