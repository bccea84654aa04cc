pub mod deploy;
pub mod login;
pub mod status;
