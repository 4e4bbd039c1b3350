//! Work order repository (`ordenes_trabajo`).
//!
//! Line items live in the `servicios` JSON column. The stored `precio_total`
//! is not trusted: the total is recomputed from the lines on load and a
//! mismatch is logged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use dentalab_core::{
    ClinicId, DentistId, LineItem, LinesUpdate, NewWorkOrder, OrderEdit, ServiceId, TechnicianId,
    UserId, WorkOrder, WorkOrderId, WorkOrderStatus, lines_total,
};

use super::{
    RepositoryError, corrupt, de_opt_decimal, first_row, parse_date, parse_row, parse_rows,
};
use crate::auth::AccessToken;
use crate::store::{DataStore, Query};

pub(crate) const TABLE: &str = "ordenes_trabajo";

// =============================================================================
// Internal Row Types
// =============================================================================

/// One entry of the `servicios` column.
///
/// Older rows carry only the line `precio`; the unit price is then derived
/// from it and the stored line price is kept as is.
#[derive(Debug, Serialize, Deserialize)]
struct LineRow {
    servicio_id: ServiceId,
    #[serde(default)]
    nombre: String,
    cantidad: u32,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    precio_unitario: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    precio: Option<Decimal>,
    #[serde(default)]
    pieza: Option<String>,
}

impl From<&LineItem> for LineRow {
    fn from(line: &LineItem) -> Self {
        Self {
            servicio_id: line.service_id,
            nombre: line.service_name.clone(),
            cantidad: line.quantity,
            precio_unitario: Some(line.unit_price),
            precio: Some(line.price),
            pieza: line.tooth.clone(),
        }
    }
}

impl TryFrom<LineRow> for LineItem {
    type Error = RepositoryError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let quantity = Decimal::from(row.cantidad);
        let (unit_price, price) = match (row.precio_unitario, row.precio) {
            (Some(unit), stored) => {
                let price = unit * quantity;
                if let Some(stored) = stored
                    && stored != price
                {
                    tracing::warn!(
                        service_id = %row.servicio_id,
                        stored = %stored,
                        computed = %price,
                        "Line price does not match quantity × unit price"
                    );
                }
                (unit, price)
            }
            (None, Some(stored)) if row.cantidad > 0 => ((stored / quantity).round_dp(2), stored),
            (None, _) => {
                return Err(RepositoryError::DataCorruption(format!(
                    "line for service {} has no usable price",
                    row.servicio_id
                )));
            }
        };
        Ok(Self {
            service_id: row.servicio_id,
            service_name: row.nombre,
            quantity: row.cantidad,
            unit_price,
            price,
            tooth: row.pieza.filter(|p| !p.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WorkOrderRow {
    id: WorkOrderId,
    user_id: UserId,
    paciente: String,
    clinica_id: ClinicId,
    dentista_id: DentistId,
    #[serde(default)]
    laboratorista_id: Option<TechnicianId>,
    #[serde(default)]
    servicios: Option<Vec<LineRow>>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    precio_total: Option<Decimal>,
    estado: String,
    fecha_creacion: String,
    fecha_entrega_estimada: String,
    #[serde(default)]
    notas: Option<String>,
}

impl TryFrom<WorkOrderRow> for WorkOrder {
    type Error = RepositoryError;

    fn try_from(row: WorkOrderRow) -> Result<Self, Self::Error> {
        let lines = row
            .servicios
            .unwrap_or_default()
            .into_iter()
            .map(LineItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let total = lines_total(&lines);
        if let Some(stored) = row.precio_total
            && stored != total
        {
            tracing::warn!(
                order_id = %row.id,
                stored = %stored,
                computed = %total,
                "Stored order total differs from its lines, using computed total"
            );
        }

        Ok(Self {
            id: row.id,
            owner: row.user_id,
            patient: row.paciente,
            clinic_id: row.clinica_id,
            dentist_id: row.dentista_id,
            technician_id: row.laboratorista_id,
            lines,
            total,
            status: row.estado.parse().map_err(corrupt("estado"))?,
            created_on: parse_date(&row.fecha_creacion)?,
            estimated_delivery: parse_date(&row.fecha_entrega_estimada)?,
            notes: row.notas.unwrap_or_default(),
        })
    }
}

fn lines_json(lines: &[LineItem]) -> Value {
    Value::Array(
        lines
            .iter()
            .map(|line| serde_json::to_value(LineRow::from(line)).unwrap_or(Value::Null))
            .collect(),
    )
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for work orders.
pub struct WorkOrderRepository<'a> {
    store: &'a dyn DataStore,
    token: &'a AccessToken,
    owner: UserId,
}

impl<'a> WorkOrderRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, token: &'a AccessToken, owner: UserId) -> Self {
        Self {
            store,
            token,
            owner,
        }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list(&self) -> Result<Vec<WorkOrder>, RepositoryError> {
        let query = Query::table(TABLE)
            .owned_by(self.owner)
            .order_by("fecha_creacion", false);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<WorkOrderRow, WorkOrder>(rows))
    }

    /// Every order in the system, for back-office statistics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn list_all(&self) -> Result<Vec<WorkOrder>, RepositoryError> {
        let query = Query::table(TABLE).order_by("fecha_creacion", false);
        let rows = self.store.select(self.token, &query).await?;
        Ok(parse_rows::<WorkOrderRow, WorkOrder>(rows))
    }

    /// Insert a validated order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn create(&self, order: &NewWorkOrder) -> Result<WorkOrder, RepositoryError> {
        let row = self
            .store
            .insert(
                self.token,
                TABLE,
                json!({
                    "paciente": order.patient,
                    "clinica_id": order.clinic_id,
                    "dentista_id": order.dentist_id,
                    "laboratorista_id": order.technician_id,
                    "servicios": lines_json(&order.lines),
                    "precio_total": order.total,
                    "estado": order.status,
                    "fecha_creacion": order.created_on.to_string(),
                    "fecha_entrega_estimada": order.estimated_delivery.to_string(),
                    "notas": order.notes,
                    "user_id": self.owner,
                }),
            )
            .await?;
        parse_row::<WorkOrderRow, WorkOrder>(row)
    }

    /// Set the status of one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned order has this ID.
    pub async fn set_status(
        &self,
        id: WorkOrderId,
        status: WorkOrderStatus,
    ) -> Result<WorkOrder, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({ "estado": status, "user_id": self.owner }),
            )
            .await?;
        first_row::<WorkOrderRow, WorkOrder>(rows)
    }

    /// Set the status of several orders in one call.
    ///
    /// Returns the updated rows; an empty `ids` makes no call.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store call fails or a row is invalid.
    pub async fn set_status_many(
        &self,
        ids: &[WorkOrderId],
        status: WorkOrderStatus,
    ) -> Result<Vec<WorkOrder>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table(TABLE)
            .is_in("id", ids.iter())
            .owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({ "estado": status, "user_id": self.owner }),
            )
            .await?;
        Ok(parse_rows::<WorkOrderRow, WorkOrder>(rows))
    }

    /// Save the amendable header fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned order has this ID.
    pub async fn update(&self, id: WorkOrderId, edit: &OrderEdit) -> Result<WorkOrder, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({
                    "paciente": edit.patient,
                    "notas": edit.notes,
                    "fecha_entrega_estimada": edit.estimated_delivery.to_string(),
                    "estado": edit.status,
                    "user_id": self.owner,
                }),
            )
            .await?;
        first_row::<WorkOrderRow, WorkOrder>(rows)
    }

    /// Replace the line items and total together.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned order has this ID.
    pub async fn update_lines(
        &self,
        id: WorkOrderId,
        update: &LinesUpdate,
    ) -> Result<WorkOrder, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self
            .store
            .update(
                self.token,
                &query,
                json!({
                    "servicios": lines_json(&update.lines),
                    "precio_total": update.total,
                    "user_id": self.owner,
                }),
            )
            .await?;
        first_row::<WorkOrderRow, WorkOrder>(rows)
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no owned order has this ID.
    pub async fn delete(&self, id: WorkOrderId) -> Result<WorkOrder, RepositoryError> {
        let query = Query::table(TABLE).eq("id", id).owned_by(self.owner);
        let rows = self.store.delete(self.token, &query).await?;
        first_row::<WorkOrderRow, WorkOrder>(rows)
    }
}
