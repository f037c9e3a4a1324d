//! Brewline platform layer.
//!
//! Everything that talks to the outside world on behalf of both binaries:
//!
//! - [`db`] - Postgres pool, migrations and the shared repositories
//! - [`auth`] - the platform's auth REST API (password, OAuth with PKCE)
//! - [`storage`] - image uploads to object storage
//! - [`realtime`] - LISTEN/NOTIFY change feed fanned out to subscribers
//! - [`whatsapp`] - gateway client, status monitor and order notifications
//! - [`config`] - environment helpers and secret validation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod db;
pub mod realtime;
pub mod storage;
pub mod whatsapp;
