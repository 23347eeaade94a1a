pub mod categorias;
pub mod health;
pub mod oauth;
pub mod pessoas;
