// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Server side of the session protocol.
//!
//! ## Auth Flow
//!
//! 1. Client posts email/password to `/auth/login` or a Google credential to
//!    `/auth/google`
//! 2. [`CredentialAuthenticator`] resolves the attempt to a stored [`Identity`]
//! 3. [`SessionIssuer`] mints a [`TokenPair`]:
//!    - access token (15 min, `JWT_ACCESS_SECRET`)
//!    - refresh token (7 days, `JWT_REFRESH_SECRET`)
//! 4. Client sends `Authorization: Bearer <access token>` on every call and
//!    exchanges the refresh token at `/auth/refresh` before expiry
//!
//! ## Security
//!
//! - Access and refresh tokens are signed with distinct secrets
//! - Unknown email and wrong password produce the same error
//! - Refresh is stateless: claims come from the refresh token itself
//! - Internal failures are logged, never returned to the caller

pub mod authenticator;
pub mod claims;
pub mod codec;
pub mod error;
pub mod extractor;
pub mod google;
pub mod issuer;
pub mod password;
pub mod roles;

pub use authenticator::CredentialAuthenticator;
pub use claims::{Identity, Profile, TokenClaims, TokenPair};
pub use codec::TokenError;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth, StaffOnly};
pub use google::{FederatedIdentity, GoogleIdentityProvider, IdentityProvider};
pub use issuer::{AccessTokenResponse, LoginResponse, SessionIssuer};
pub use password::{Argon2Scheme, PasswordScheme};
pub use roles::Role;
