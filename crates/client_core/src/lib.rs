//! Client side of PetWalking: the post card presenter and the gateways it
//! talks through.

pub mod gateway;
pub mod http;
pub mod post_card;

pub use gateway::{InteractionGateway, LocalGateway};
pub use http::HttpGateway;
pub use post_card::{CardPhase, CardView, PostCard};

#[cfg(test)]
#[path = "tests/support.rs"]
mod support;

#[cfg(test)]
#[path = "tests/post_card_tests.rs"]
mod post_card_tests;

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod gateway_tests;

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod http_tests;

#[cfg(test)]
#[path = "tests/http_router_tests.rs"]
mod http_router_tests;
