// handlers/mod.rs
//
// Two tiers: public endpoints need no credential, everything under
// /api/admin runs the guard pipeline (admin bearer, then impersonation
// overlay, then elevation where the operation mutates).

pub mod admin;
pub mod public;
