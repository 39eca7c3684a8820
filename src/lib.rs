//! Pairline - Anonymous peer-pairing chat relay and matchmaking service
//!
//! This library pairs anonymous users for one-on-one chats, relays their
//! messages, and maintains like/dislike reputation with automatic banning.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{MatchError, MatchOutcome, Matchmaker, RatingEngine, Relay, RelayOutcome};
pub use models::{
    MessagePayload, SearchScope, Session, UserId, UserProfile, UserState,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let rating = UserProfile::computed_rating(3, 1);
        assert_eq!(rating, 75.0);
    }
}
