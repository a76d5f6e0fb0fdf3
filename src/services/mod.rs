pub mod admin_service;
pub mod auth_service;
pub mod intake_service;
pub mod lifecycle_service;
pub mod order_service;
pub mod stock_service;
