// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Control, DistrictRelation, MessagePayload, QueueEntry, RatingSnapshot, RelayedMessage,
    SearchScope, Session, UserId, UserProfile, UserState,
};
pub use requests::{
    BanRequest, BlacklistRequest, BroadcastRequest, RateRequest, RelayRequest, SearchRequest,
    UserActionRequest,
};
pub use responses::{
    ActionResponse, BroadcastResponse, ErrorResponse, HealthResponse, RateResponse,
    SearchResponse, StatsResponse,
};
