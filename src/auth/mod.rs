// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! # Authentication Module
//!
//! Bearer-token authentication for the wallet API.
//!
//! ## Auth Flow
//!
//! 1. The frontend authenticates the user and obtains a JWT
//! 2. Requests carry `Authorization: Bearer <JWT>`
//! 3. This server verifies the token and extracts:
//!    - `sub` → canonical `user_id`
//!    - `name` → optional display name
//!
//! ## Modes
//!
//! - **Production** (`AUTH_JWT_SECRET` set): HS256 signature verification,
//!   expiry and optional issuer checks
//! - **Development** (no secret): structure validation only, no signature
//!   check. Never run production this way.

pub mod claims;
pub mod error;
pub mod extractor;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
