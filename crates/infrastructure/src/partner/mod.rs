pub mod client;
pub mod token;

pub use client::HttpPartnerClient;
pub use token::TokenCache;
