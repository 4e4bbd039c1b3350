//! Dentalab Core - domain types and business rules.
//!
//! This crate holds everything the web application needs that does not touch
//! the network: typed identifiers, money, statuses, the work-order cart and
//! aggregation rules, registry validation, lab tax math, back-office
//! statistics and the plan catalogue.
//!
//! # Architecture
//!
//! No I/O, no HTTP clients, no persistence. Remote records are parsed into
//! these types at the repository boundary in `dentalab-web`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, email, money and statuses
//! - [`local`] - Local mirrors of remote record lists
//! - [`registry`] - Clinics, dentists, services and technicians
//! - [`work_order`] - Line items, cart, orders and board queries
//! - [`lab_config`] - Letterhead and tax settings
//! - [`backoffice`] - Users, memberships, payments and statistics
//! - [`plans`] - Subscription plan catalogue

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backoffice;
pub mod lab_config;
pub mod local;
pub mod plans;
pub mod registry;
pub mod types;
pub mod work_order;

pub use backoffice::{
    BackofficeStats, Membership, Payment, PlanShare, TextFilter, UserProfile, completed_revenue,
    days_remaining, plan_distribution,
};
pub use lab_config::{
    LabConfig, LabConfigError, LabConfigFields, LabConfigInput, PREVIEW_SUBTOTAL, TaxMode,
    TaxPreview, TaxSettings, parse_percent,
};
pub use local::{LocalList, Record};
pub use plans::{PLANS, Plan, plan_by_id};
pub use registry::{
    Clinic, ClinicDirectory, ClinicInput, Dentist, DentistFields, DentistInput, RegistryError,
    Service, ServiceFields, ServiceInput, Technician, TechnicianInput, parse_price, price_list,
};
pub use types::*;
pub use work_order::{
    Cart, DEFAULT_DELIVERY_DAYS, LineItem, LinesUpdate, NewWorkOrder, OrderDraft, OrderEdit,
    OrderError, OrderFilter, StatusCounts, WorkOrder, default_delivery, finalize_candidates,
    lines_total,
};
