pub mod calendar_gateway;
pub mod category_store;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod link_store;
pub mod logging;
pub mod notifications;
pub mod placeholders;
pub mod storage;
pub mod sweep_state;
pub mod task_store;
