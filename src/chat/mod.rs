pub mod channel;
pub mod resolver;
pub mod scorer;
