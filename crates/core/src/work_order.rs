//! Work orders: line items, the composing cart, and order aggregation.
//!
//! The aggregate total of an order is always the sum of its line prices.
//! Every constructor and mutation in this module recomputes it from the
//! lines rather than adjusting it incrementally.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::local::Record;
use crate::registry::Service;
use crate::types::{ClinicId, DentistId, ServiceId, TechnicianId, UserId, WorkOrderId, WorkOrderStatus};

/// Default delivery estimate, counted from the creation date.
pub const DEFAULT_DELIVERY_DAYS: u64 = 7;

/// Rejections raised while composing or amending an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Add at least one service before saving the order.")]
    EmptyCart,

    #[error("Select a clinic for the order.")]
    MissingClinic,

    #[error("Select a dentist for the order.")]
    MissingDentist,

    #[error("The selected dentist does not work at the selected clinic.")]
    DentistNotAtClinic,

    #[error("Enter the patient's name.")]
    MissingPatient,

    #[error("Quantity must be at least 1.")]
    InvalidQuantity,

    #[error("The service \"{0}\" is inactive and cannot be ordered.")]
    InactiveService(String),

    #[error("Line {index} does not exist (the order has {len} lines).")]
    LineOutOfRange { index: usize, len: usize },

    #[error("The estimated delivery date cannot be before the creation date.")]
    DeliveryBeforeCreation,
}

/// One service entry within an order.
///
/// The service name and unit price are copied in when the line is created so
/// later catalogue edits do not rewrite past orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub service_id: ServiceId,
    pub service_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// `quantity × unit_price`.
    pub price: Decimal,
    /// Tooth or piece label, e.g. "11" or "upper arch".
    pub tooth: Option<String>,
}

impl LineItem {
    /// Price a line for `quantity` units of `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` is zero or the service is inactive.
    pub fn new(service: &Service, quantity: u32, tooth: Option<&str>) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }
        if !service.active {
            return Err(OrderError::InactiveService(service.name.clone()));
        }
        let tooth = tooth
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        Ok(Self {
            service_id: service.id,
            service_name: service.name.clone(),
            quantity,
            unit_price: service.base_price,
            price: service.base_price * Decimal::from(quantity),
            tooth,
        })
    }
}

/// Sum of line prices.
#[must_use]
pub fn lines_total(lines: &[LineItem]) -> Decimal {
    lines.iter().map(|line| line.price).sum()
}

/// A persisted work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub owner: UserId,
    pub patient: String,
    pub clinic_id: ClinicId,
    pub dentist_id: DentistId,
    pub technician_id: Option<TechnicianId>,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub status: WorkOrderStatus,
    pub created_on: NaiveDate,
    pub estimated_delivery: NaiveDate,
    pub notes: String,
}

impl Record for WorkOrder {
    type Id = WorkOrderId;

    fn id(&self) -> WorkOrderId {
        self.id
    }
}

/// New line list and total to persist after removing a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinesUpdate {
    pub lines: Vec<LineItem>,
    pub total: Decimal,
}

impl WorkOrder {
    /// Whether the stored total matches the lines.
    #[must_use]
    pub fn total_is_consistent(&self) -> bool {
        self.total == lines_total(&self.lines)
    }

    /// Lines and total the order would have without line `index`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::LineOutOfRange`] if there is no such line.
    pub fn without_line(&self, index: usize) -> Result<LinesUpdate, OrderError> {
        if index >= self.lines.len() {
            return Err(OrderError::LineOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        let lines: Vec<LineItem> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, line)| line.clone())
            .collect();
        let total = lines_total(&lines);
        Ok(LinesUpdate { lines, total })
    }

    /// Days until the estimated delivery (negative once overdue).
    #[must_use]
    pub fn days_until_delivery(&self, today: NaiveDate) -> i64 {
        (self.estimated_delivery - today).num_days()
    }
}

// =============================================================================
// Cart and draft
// =============================================================================

/// In-progress line items, kept in the session until the order is saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    /// Add `quantity` units of `service`.
    ///
    /// # Errors
    ///
    /// See [`LineItem::new`].
    pub fn add(&mut self, service: &Service, quantity: u32, tooth: Option<&str>) -> Result<(), OrderError> {
        self.lines.push(LineItem::new(service, quantity, tooth)?);
        Ok(())
    }

    /// Remove the line at `index`.
    pub fn remove(&mut self, index: usize) -> Option<LineItem> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of `quantity × base_price` over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        lines_total(&self.lines)
    }
}

/// Order header fields typed into the compose form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub patient: String,
    pub clinic_id: Option<ClinicId>,
    pub dentist_id: Option<DentistId>,
    pub technician_id: Option<TechnicianId>,
    pub notes: String,
    /// Overrides the default delivery estimate when set.
    pub estimated_delivery: Option<NaiveDate>,
}

/// A validated order ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkOrder {
    pub patient: String,
    pub clinic_id: ClinicId,
    pub dentist_id: DentistId,
    pub technician_id: Option<TechnicianId>,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub status: WorkOrderStatus,
    pub created_on: NaiveDate,
    pub estimated_delivery: NaiveDate,
    pub notes: String,
}

impl OrderDraft {
    /// Combine the draft with the cart into an insertable order.
    ///
    /// # Errors
    ///
    /// Rejects an empty cart, a missing clinic, dentist or patient, and a
    /// delivery override earlier than `today`.
    pub fn submit(self, cart: &Cart, today: NaiveDate) -> Result<NewWorkOrder, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let clinic_id = self.clinic_id.ok_or(OrderError::MissingClinic)?;
        let dentist_id = self.dentist_id.ok_or(OrderError::MissingDentist)?;
        let patient = self.patient.trim();
        if patient.is_empty() {
            return Err(OrderError::MissingPatient);
        }

        let estimated_delivery = match self.estimated_delivery {
            Some(date) if date < today => return Err(OrderError::DeliveryBeforeCreation),
            Some(date) => date,
            None => default_delivery(today),
        };

        let lines = cart.lines().to_vec();
        let total = lines_total(&lines);
        Ok(NewWorkOrder {
            patient: patient.to_owned(),
            clinic_id,
            dentist_id,
            technician_id: self.technician_id,
            lines,
            total,
            status: WorkOrderStatus::Pending,
            created_on: today,
            estimated_delivery,
            notes: self.notes.trim().to_owned(),
        })
    }
}

/// Creation date plus [`DEFAULT_DELIVERY_DAYS`].
#[must_use]
pub fn default_delivery(created_on: NaiveDate) -> NaiveDate {
    created_on
        .checked_add_days(Days::new(DEFAULT_DELIVERY_DAYS))
        .unwrap_or(created_on)
}

/// Amendable fields of an existing order, submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEdit {
    pub patient: String,
    pub notes: String,
    pub estimated_delivery: NaiveDate,
    pub status: WorkOrderStatus,
}

impl OrderEdit {
    /// Trim text fields and require a patient name.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::MissingPatient`] for a blank patient.
    pub fn validate(self) -> Result<Self, OrderError> {
        let patient = self.patient.trim();
        if patient.is_empty() {
            return Err(OrderError::MissingPatient);
        }
        Ok(Self {
            patient: patient.to_owned(),
            notes: self.notes.trim().to_owned(),
            ..self
        })
    }
}

// =============================================================================
// Board queries
// =============================================================================

/// Orders of `clinic` that a bulk finalize would move to `finished`.
#[must_use]
pub fn finalize_candidates(orders: &[WorkOrder], clinic: ClinicId) -> Vec<WorkOrderId> {
    orders
        .iter()
        .filter(|o| o.clinic_id == clinic && o.status.is_open())
        .map(|o| o.id)
        .collect()
}

/// Board filter from the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub clinic: Option<ClinicId>,
    pub status: Option<WorkOrderStatus>,
}

impl OrderFilter {
    #[must_use]
    pub fn matches(&self, order: &WorkOrder) -> bool {
        self.clinic.is_none_or(|c| order.clinic_id == c)
            && self.status.is_none_or(|s| order.status == s)
    }
}

/// Number of orders in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_production: usize,
    pub finished: usize,
    pub delivered: usize,
}

impl StatusCounts {
    pub fn tally<'a>(orders: impl IntoIterator<Item = &'a WorkOrder>) -> Self {
        orders
            .into_iter()
            .fold(Self::default(), |mut counts, order| {
                match order.status {
                    WorkOrderStatus::Pending => counts.pending += 1,
                    WorkOrderStatus::InProduction => counts.in_production += 1,
                    WorkOrderStatus::Finished => counts.finished += 1,
                    WorkOrderStatus::Delivered => counts.delivered += 1,
                }
                counts
            })
    }

    /// Orders still needing lab work.
    #[must_use]
    pub const fn open(&self) -> usize {
        self.pending + self.in_production
    }

    #[must_use]
    pub const fn get(&self, status: WorkOrderStatus) -> usize {
        match status {
            WorkOrderStatus::Pending => self.pending,
            WorkOrderStatus::InProduction => self.in_production,
            WorkOrderStatus::Finished => self.finished,
            WorkOrderStatus::Delivered => self.delivered,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ServiceCategory;

    fn service(name: &str, price: i64, active: bool) -> Service {
        Service {
            id: ServiceId::generate(),
            owner: UserId::generate(),
            name: name.to_owned(),
            base_price: Decimal::new(price, 0),
            category: ServiceCategory::Orthodontics,
            active,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            patient: " Jane Doe ".to_owned(),
            clinic_id: Some(ClinicId::generate()),
            dentist_id: Some(DentistId::generate()),
            ..OrderDraft::default()
        }
    }

    fn order(clinic: ClinicId, status: WorkOrderStatus, lines: Vec<LineItem>) -> WorkOrder {
        let total = lines_total(&lines);
        WorkOrder {
            id: WorkOrderId::generate(),
            owner: UserId::generate(),
            patient: "P".to_owned(),
            clinic_id: clinic,
            dentist_id: DentistId::generate(),
            technician_id: None,
            lines,
            total,
            status,
            created_on: date(2026, 1, 1),
            estimated_delivery: date(2026, 1, 8),
            notes: String::new(),
        }
    }

    #[test]
    fn test_line_price_is_quantity_times_base_price() {
        let line = LineItem::new(&service("Aligner", 100, true), 2, Some(" 11 ")).unwrap();
        assert_eq!(line.price, Decimal::new(200, 0));
        assert_eq!(line.unit_price, Decimal::new(100, 0));
        assert_eq!(line.tooth.as_deref(), Some("11"));

        let blank_tooth = LineItem::new(&service("Aligner", 100, true), 1, Some("  ")).unwrap();
        assert!(blank_tooth.tooth.is_none());
    }

    #[test]
    fn test_line_rejects_zero_quantity_and_inactive_service() {
        assert_eq!(
            LineItem::new(&service("Aligner", 100, true), 0, None),
            Err(OrderError::InvalidQuantity)
        );
        assert_eq!(
            LineItem::new(&service("Old crown", 100, false), 1, None),
            Err(OrderError::InactiveService("Old crown".to_owned()))
        );
    }

    #[test]
    fn test_cart_total_and_remove() {
        let mut cart = Cart::default();
        cart.add(&service("A", 100, true), 2, None).unwrap();
        cart.add(&service("B", 35, true), 3, Some("21")).unwrap();
        assert_eq!(cart.total(), Decimal::new(305, 0));

        assert!(cart.remove(5).is_none());
        let removed = cart.remove(0).unwrap();
        assert_eq!(removed.service_name, "A");
        assert_eq!(cart.total(), Decimal::new(105, 0));

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }

    #[test]
    fn test_submit_rejects_empty_cart_first() {
        let result = OrderDraft::default().submit(&Cart::default(), date(2026, 3, 1));
        assert_eq!(result, Err(OrderError::EmptyCart));
    }

    #[test]
    fn test_submit_requires_clinic_dentist_and_patient() {
        let mut cart = Cart::default();
        cart.add(&service("A", 100, true), 1, None).unwrap();
        let today = date(2026, 3, 1);

        let no_clinic = OrderDraft {
            clinic_id: None,
            ..draft()
        };
        assert_eq!(no_clinic.submit(&cart, today), Err(OrderError::MissingClinic));

        let no_dentist = OrderDraft {
            dentist_id: None,
            ..draft()
        };
        assert_eq!(no_dentist.submit(&cart, today), Err(OrderError::MissingDentist));

        let no_patient = OrderDraft {
            patient: "  ".to_owned(),
            ..draft()
        };
        assert_eq!(no_patient.submit(&cart, today), Err(OrderError::MissingPatient));
    }

    #[test]
    fn test_submit_defaults_delivery_and_status() {
        let mut cart = Cart::default();
        cart.add(&service("Aligner", 100, true), 2, None).unwrap();

        let order = draft().submit(&cart, date(2026, 2, 25)).unwrap();

        assert_eq!(order.patient, "Jane Doe");
        assert_eq!(order.total, Decimal::new(200, 0));
        assert_eq!(order.status, WorkOrderStatus::Pending);
        assert_eq!(order.created_on, date(2026, 2, 25));
        assert_eq!(order.estimated_delivery, date(2026, 3, 4));
    }

    #[test]
    fn test_submit_delivery_override() {
        let mut cart = Cart::default();
        cart.add(&service("A", 10, true), 1, None).unwrap();
        let today = date(2026, 3, 1);

        let custom = OrderDraft {
            estimated_delivery: Some(date(2026, 3, 20)),
            ..draft()
        };
        assert_eq!(
            custom.submit(&cart, today).unwrap().estimated_delivery,
            date(2026, 3, 20)
        );

        let past = OrderDraft {
            estimated_delivery: Some(date(2026, 2, 1)),
            ..draft()
        };
        assert_eq!(past.submit(&cart, today), Err(OrderError::DeliveryBeforeCreation));
    }

    #[test]
    fn test_without_line_recomputes_total() {
        let a = LineItem::new(&service("A", 100, true), 2, None).unwrap();
        let b = LineItem::new(&service("B", 50, true), 1, None).unwrap();
        let order = order(ClinicId::generate(), WorkOrderStatus::Pending, vec![a, b]);
        assert!(order.total_is_consistent());

        let update = order.without_line(0).unwrap();
        assert_eq!(update.lines.len(), 1);
        assert_eq!(update.total, Decimal::new(50, 0));

        assert_eq!(
            order.without_line(2),
            Err(OrderError::LineOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_finalize_candidates_only_open_orders_of_clinic() {
        let clinic = ClinicId::generate();
        let other = ClinicId::generate();
        let orders = vec![
            order(clinic, WorkOrderStatus::Pending, vec![]),
            order(clinic, WorkOrderStatus::InProduction, vec![]),
            order(clinic, WorkOrderStatus::Finished, vec![]),
            order(clinic, WorkOrderStatus::Delivered, vec![]),
            order(other, WorkOrderStatus::Pending, vec![]),
        ];

        let ids = finalize_candidates(&orders, clinic);

        assert_eq!(ids, vec![orders[0].id, orders[1].id]);
        assert!(finalize_candidates(&orders[2..4], clinic).is_empty());
    }

    #[test]
    fn test_status_counts_and_filter() {
        let clinic = ClinicId::generate();
        let orders = vec![
            order(clinic, WorkOrderStatus::Pending, vec![]),
            order(clinic, WorkOrderStatus::Pending, vec![]),
            order(ClinicId::generate(), WorkOrderStatus::Delivered, vec![]),
        ];

        let counts = StatusCounts::tally(&orders);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.delivered, 1);
        assert_eq!(counts.open(), 2);
        assert_eq!(counts.get(WorkOrderStatus::Finished), 0);

        let filter = OrderFilter {
            clinic: Some(clinic),
            status: None,
        };
        assert_eq!(orders.iter().filter(|o| filter.matches(o)).count(), 2);
    }

    #[test]
    fn test_edit_requires_patient() {
        let edit = OrderEdit {
            patient: "  ".to_owned(),
            notes: String::new(),
            estimated_delivery: date(2026, 1, 1),
            status: WorkOrderStatus::Delivered,
        };
        assert_eq!(edit.validate(), Err(OrderError::MissingPatient));
    }
}
