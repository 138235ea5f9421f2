pub mod members;
pub mod run;
pub mod validate;
