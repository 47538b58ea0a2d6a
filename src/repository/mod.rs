pub mod configs;
pub mod password_resets;
pub mod properties;
pub mod tenants;
pub mod users;
