pub mod action;
pub mod domain;
pub mod effects;
pub mod problem;
pub mod typing;
pub mod variables;
