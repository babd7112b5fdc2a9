pub mod agents;
pub mod documents;
pub mod health;
pub mod integrations;
pub mod knowledge;
pub mod records;
pub mod settings;
pub mod websocket;
pub mod workflows;
