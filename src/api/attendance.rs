use crate::{
    api::{WriteMode, check_required, check_text},
    error::{ApiError, FieldErrors, NON_FIELD_ERRORS},
    model::attendance::{Attendance, AttendanceStatus},
    utils::db_utils::{
        Constraint, SqlUpdate, SqlValue, constraint_violation, execute_update, row_exists,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;
use utoipa::ToSchema;

/// The foreign key column is exposed as `employee`.
pub(crate) const ATTENDANCE_SELECT: &str =
    "SELECT id, employee_id AS employee, date, status FROM attendance";

const DATE_FORMAT_ERROR: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";
const UNIQUE_DAY_ERROR: &str = "The fields employee, date must make a unique set.";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AttendanceInput {
    #[schema(example = 1)]
    pub employee: Option<i64>,

    #[schema(example = "2024-01-01", format = "date")]
    pub date: Option<String>,

    #[schema(example = "Present")]
    pub status: Option<String>,
}

/// Input that passed field validation. Fields stay optional for PATCH.
#[derive(Debug, Default, PartialEq)]
pub struct AttendanceChanges {
    pub employee: Option<i64>,
    pub date: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

/// A complete, validated attendance body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewAttendance {
    pub employee: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl From<NewAttendance> for AttendanceChanges {
    fn from(new: NewAttendance) -> Self {
        Self {
            employee: Some(new.employee),
            date: Some(new.date),
            status: Some(new.status),
        }
    }
}

impl AttendanceInput {
    /// Parses every given field, recording what is missing, blank or malformed.
    fn check(mut self, mode: WriteMode, errors: &mut FieldErrors) -> AttendanceChanges {
        check_required(errors, mode, "employee", &self.employee);
        check_text(errors, mode, "date", &mut self.date);
        check_text(errors, mode, "status", &mut self.status);

        let mut changes = AttendanceChanges {
            employee: self.employee,
            ..Default::default()
        };

        if let Some(date) = self.date.as_deref().filter(|d| !d.is_empty()) {
            match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(d) => changes.date = Some(d),
                Err(_) => errors.add("date", DATE_FORMAT_ERROR),
            }
        }

        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            match AttendanceStatus::from_str(status) {
                Ok(s) => changes.status = Some(s),
                Err(_) => errors.add("status", format!("\"{status}\" is not a valid choice.")),
            }
        }

        changes
    }

    /// POST and PUT: every field must be present and valid.
    pub fn into_new(self) -> Result<NewAttendance, ApiError> {
        let mut errors = FieldErrors::new();
        let changes = self.check(WriteMode::Full, &mut errors);

        match (changes.employee, changes.date, changes.status) {
            (Some(employee), Some(date), Some(status)) if errors.is_empty() => Ok(NewAttendance {
                employee,
                date,
                status,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }

    /// PATCH: whatever subset was sent, checked the same way.
    pub fn into_changes(self) -> Result<AttendanceChanges, ApiError> {
        let mut errors = FieldErrors::new();
        let changes = self.check(WriteMode::Partial, &mut errors);
        errors.into_result()?;
        Ok(changes)
    }
}

impl AttendanceChanges {
    fn into_update(self, id: i64) -> SqlUpdate {
        let mut update = SqlUpdate::new("attendance", "id", id);
        if let Some(employee) = self.employee {
            update.set("employee_id", SqlValue::I64(employee));
        }
        if let Some(date) = self.date {
            update.set("date", SqlValue::Date(date));
        }
        if let Some(status) = self.status {
            update.set("status", SqlValue::String(status.to_string()));
        }
        update
    }
}

/// Maps a rejected write to the fields the client has to fix.
fn constraint_error(e: sqlx::Error, employee: Option<i64>) -> ApiError {
    match constraint_violation(&e) {
        Some(Constraint::Unique(_)) => {
            ApiError::Validation(FieldErrors::single(NON_FIELD_ERRORS, UNIQUE_DAY_ERROR))
        }
        Some(Constraint::ForeignKey) => {
            let pk = employee.map(|id| id.to_string()).unwrap_or_default();
            ApiError::Validation(FieldErrors::single(
                "employee",
                format!("Invalid pk \"{pk}\" - object does not exist."),
            ))
        }
        None => e.into(),
    }
}

async fn load_attendance<'e, E>(executor: E, id: i64) -> Result<Option<Attendance>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!("{ATTENDANCE_SELECT} WHERE id = ?");
    sqlx::query_as::<_, Attendance>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// List Attendance
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 200, description = "All attendance records", body = [Attendance])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(pool: web::Data<SqlitePool>) -> Result<impl Responder, ApiError> {
    let sql = format!("{ATTENDANCE_SELECT} ORDER BY id");
    let records = sqlx::query_as::<_, Attendance>(&sql)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(records))
}

/// Mark Attendance
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = AttendanceInput,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 400, description = "Invalid fields, unknown employee or day already recorded", body = Object, example = json!({
            "non_field_errors": ["The fields employee, date must make a unique set."]
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn create_attendance(
    pool: web::Data<SqlitePool>,
    payload: web::Json<AttendanceInput>,
) -> Result<impl Responder, ApiError> {
    let NewAttendance {
        employee,
        date,
        status,
    } = payload.into_inner().into_new()?;

    let result = sqlx::query("INSERT INTO attendance (employee_id, date, status) VALUES (?, ?, ?)")
        .bind(employee)
        .bind(date)
        .bind(status)
        .execute(pool.get_ref())
        .await
        .map_err(|e| constraint_error(e, Some(employee)))?;

    let id = result.last_insert_rowid();
    info!(id, employee, %date, %status, "Attendance recorded");

    Ok(HttpResponse::Created().json(Attendance {
        id,
        employee,
        date,
        status,
    }))
}

/// Get Attendance by ID
#[utoipa::path(
    get,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance row id")
    ),
    responses(
        (status = 200, description = "Attendance found", body = Attendance),
        (status = 404, description = "Attendance not found", body = Object, example = json!({
            "detail": "Not found."
        }))
    ),
    tag = "Attendance"
)]
pub async fn get_attendance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let record = load_attendance(pool.get_ref(), path.into_inner())
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok().json(record))
}

async fn write_attendance(
    pool: &SqlitePool,
    id: i64,
    input: AttendanceInput,
    mode: WriteMode,
) -> Result<HttpResponse, ApiError> {
    let mut tx = pool.begin().await?;

    // a missing row is reported before anything about the body
    if !row_exists(&mut tx, "attendance", id).await? {
        return Err(ApiError::NotFound);
    }

    let changes = match mode {
        WriteMode::Full => AttendanceChanges::from(input.into_new()?),
        WriteMode::Partial => input.into_changes()?,
    };
    let employee = changes.employee;

    execute_update(&mut *tx, changes.into_update(id))
        .await
        .map_err(|e| constraint_error(e, employee))?;

    let record = load_attendance(&mut *tx, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    info!(id, ?mode, "Attendance updated");
    Ok(HttpResponse::Ok().json(record))
}

/// Update Attendance
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance row id")
    ),
    request_body = AttendanceInput,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Invalid fields, unknown employee or day already recorded"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<AttendanceInput>,
) -> Result<impl Responder, ApiError> {
    write_attendance(pool.get_ref(), path.into_inner(), payload.into_inner(), WriteMode::Full).await
}

/// Partially update Attendance
#[utoipa::path(
    patch,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance row id")
    ),
    request_body = AttendanceInput,
    responses(
        (status = 200, description = "Attendance updated", body = Attendance),
        (status = 400, description = "Invalid fields, unknown employee or day already recorded"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn partial_update_attendance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<AttendanceInput>,
) -> Result<impl Responder, ApiError> {
    write_attendance(pool.get_ref(), path.into_inner(), payload.into_inner(), WriteMode::Partial).await
}

/// Delete Attendance
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id", Path, description = "Attendance row id")
    ),
    responses(
        (status = 204, description = "Successfully deleted"),
        (status = 404, description = "Attendance not found")
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    info!(id, "Attendance deleted");
    Ok(HttpResponse::NoContent().finish())
}
