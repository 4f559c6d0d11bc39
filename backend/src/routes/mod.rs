pub mod admin;
pub mod escrow;

pub use admin::admin_routes;
pub use escrow::escrow_routes;
