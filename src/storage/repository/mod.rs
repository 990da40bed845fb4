// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Typed repositories over the file storage layer.

pub mod lightning;
pub mod seeds;
pub mod users;
pub mod wallets;

pub use lightning::{LightningNodeRecord, LightningNodeRepository};
pub use seeds::SeedRepository;
pub use users::{UserRecord, UserRepository};
pub use wallets::{WalletRecord, WalletRepository, WalletResponse};
