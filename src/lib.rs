pub mod api;
pub mod auth;
pub mod billing;
pub mod config;
pub mod domain;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod notifications;
pub mod payments;
pub mod repository;
pub mod service;
