//! External service integrations.

pub mod scoring_client {
    pub use crate::scoring_client::*;
}

pub mod local_model {
    pub use crate::local_model::*;
}
