//! Users Domain
//!
//! REST resource for managing user accounts: list, create, read, update and
//! soft delete. Every response, success or failure, is the same envelope
//! (`errs`, `errFor`, `msg`, `success`) encoded as JSON or MessagePack
//! depending on the request's `Accept` header.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, body/format extraction
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← uid check, policy gate, validation rules, hashing
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + in-memory + Postgres)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Records, DTOs, status enum
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{
//!     handlers,
//!     repository::InMemoryUserRepository,
//!     service::UserService,
//! };
//!
//! let repository = InMemoryUserRepository::new();
//! let service = UserService::new(repository);
//!
//! // Expects `JwtClaims` in request extensions, e.g. from
//! // `axum_helpers::optional_jwt_auth_middleware`
//! let router = handlers::router(service);
//! ```

pub mod actor;
pub mod config;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod format;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod policy;
pub mod postgres;
pub mod repository;
pub mod resolver;
pub mod rules;
pub mod service;

// Re-export commonly used types
pub use actor::Actor;
pub use config::UsersConfig;
pub use envelope::Envelope;
pub use error::{UserError, UserResult};
pub use format::{EnvelopeResponse, Format, JsonResponse, MessagePackResponse};
pub use handlers::ApiDoc;
pub use models::{CreateUser, UpdateUser, User, UserResponse, UserStatus};
pub use policy::{PolicyGate, RolePolicy};
pub use postgres::PgUserRepository;
pub use repository::{InMemoryUserRepository, UserRepository};
pub use resolver::{DnsResolver, HostResolver};
pub use service::UserService;
