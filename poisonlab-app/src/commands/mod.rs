pub mod check;
pub mod serve;
pub mod tools;
