pub mod devagent_route;
pub mod health_route;
