//! Order payloads and responses exchanged with the BankID relying party API.

pub mod models;
