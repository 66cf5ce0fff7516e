pub mod health;
pub mod whitelist;
