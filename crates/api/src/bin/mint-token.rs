#!/usr/bin/env cargo
//! Relay token utility for Appointly
//!
//! Issues a bearer token the relay accepts, signed with the same `JWT_SECRET`
//! the booking API uses. Handy for poking at the relay from a WebSocket client
//! without going through the login flow.
//!
//! Usage:
//!   cargo run --bin mint-token -- <name> <admin|teacher|student> [user-uuid]
//!
//! Example:
//!   cargo run --bin mint-token -- "Ada Lovelace" teacher
//!   websocat "ws://localhost:5000/ws?token=<token>"

use appointly_api::{auth::JwtManager, Config};
use appointly_shared::{Identity, Role, UserId};
use std::env;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let mut args = env::args().skip(1);
    let (Some(name), Some(role)) = (args.next(), args.next()) else {
        eprintln!("Usage: mint-token <name> <admin|teacher|student> [user-uuid]");
        std::process::exit(1);
    };

    let role: Role = role.parse()?;
    let user_id = match args.next() {
        Some(id) => UserId(Uuid::parse_str(&id)?),
        None => UserId::new(),
    };

    let config = Config::from_env()?;
    let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
    let identity = Identity::new(user_id, name, role);
    let token = jwt.generate_token(&identity)?;

    eprintln!(
        "Token for {} ({}, {}) valid for {} hours:",
        identity.name, identity.role, identity.user_id, config.jwt_expiry_hours
    );
    println!("{}", token);

    Ok(())
}
