// handlers/admin/mod.rs - privileged endpoints under /api/admin

pub mod alerts;
pub mod audit;
pub mod crud;
pub mod elevate;
pub mod impersonate;
pub mod moderation;
pub mod push;
