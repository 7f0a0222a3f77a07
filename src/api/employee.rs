use crate::{
    api::{WriteMode, attendance::ATTENDANCE_SELECT, check_text},
    error::{ApiError, FieldErrors},
    model::{attendance::Attendance, employee::Employee},
    utils::db_utils::{
        Constraint, SqlUpdate, SqlValue, constraint_violation, execute_update, row_exists,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use validator::Validate;

const EMPLOYEE_SELECT: &str =
    "SELECT id, employee_id, full_name, email, department, created_at FROM employees";

/// Body of POST, PUT and PATCH. Absent fields are only allowed on PATCH.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct EmployeeInput {
    #[schema(example = "E1", max_length = 20)]
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub employee_id: Option<String>,

    #[schema(example = "Ada Lovelace", max_length = 100)]
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub full_name: Option<String>,

    #[schema(example = "ada@company.com", format = "email", max_length = 254)]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: Option<String>,

    #[schema(example = "Engineering", max_length = 50)]
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub department: Option<String>,
}

impl EmployeeInput {
    /// Trims every given field and records what is missing, blank or malformed.
    fn check(mut self, mode: WriteMode, errors: &mut FieldErrors) -> Self {
        check_text(errors, mode, "employee_id", &mut self.employee_id);
        check_text(errors, mode, "full_name", &mut self.full_name);
        check_text(errors, mode, "email", &mut self.email);
        check_text(errors, mode, "department", &mut self.department);

        if let Err(e) = self.validate() {
            errors.merge(e.into());
        }
        self
    }

    /// POST and PUT: every field must be present and valid.
    pub fn into_new(self) -> Result<NewEmployee, ApiError> {
        let mut errors = FieldErrors::new();
        let input = self.check(WriteMode::Full, &mut errors);

        match (input.employee_id, input.full_name, input.email, input.department) {
            (Some(employee_id), Some(full_name), Some(email), Some(department))
                if errors.is_empty() =>
            {
                Ok(NewEmployee {
                    employee_id,
                    full_name,
                    email,
                    department,
                })
            }
            _ => Err(ApiError::Validation(errors)),
        }
    }

    /// PATCH: whatever subset was sent, checked the same way.
    pub fn into_changes(self) -> Result<Self, ApiError> {
        let mut errors = FieldErrors::new();
        let input = self.check(WriteMode::Partial, &mut errors);
        errors.into_result()?;
        Ok(input)
    }

    fn unique_key(&self, id: Option<i64>) -> UniqueKey {
        UniqueKey {
            id,
            employee_id: self.employee_id.clone(),
            email: self.email.clone(),
        }
    }

    fn into_update(self, id: i64) -> SqlUpdate {
        let mut update = SqlUpdate::new("employees", "id", id);
        let columns = [
            ("employee_id", self.employee_id),
            ("full_name", self.full_name),
            ("email", self.email),
            ("department", self.department),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                update.set(column, SqlValue::String(value));
            }
        }
        update
    }
}

/// A complete, validated employee body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmployee {
    pub employee_id: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
}

impl From<NewEmployee> for EmployeeInput {
    fn from(new: NewEmployee) -> Self {
        Self {
            employee_id: Some(new.employee_id),
            full_name: Some(new.full_name),
            email: Some(new.email),
            department: Some(new.department),
        }
    }
}

/// Unique values a write tries to store, and the row allowed to hold them already.
#[derive(Debug)]
struct UniqueKey {
    id: Option<i64>,
    employee_id: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_id": "E1",
        "full_name": "Ada Lovelace",
        "email": "ada@company.com",
        "department": "Engineering",
        "attendance_history": [
            { "id": 1, "employee": 1, "date": "2024-01-01", "status": "Present" }
        ]
    })
)]
pub struct EmployeeResponse {
    pub id: i64,
    pub employee_id: String,
    pub full_name: String,
    pub email: String,
    pub department: String,
    pub attendance_history: Vec<Attendance>,
}

impl EmployeeResponse {
    fn new(employee: Employee, attendance_history: Vec<Attendance>) -> Self {
        Self {
            id: employee.id,
            employee_id: employee.employee_id,
            full_name: employee.full_name,
            email: employee.email,
            department: employee.department,
            attendance_history,
        }
    }
}

/// Turns a rejected unique key into a message on every field that is already taken.
///
/// sqlite names only the first constraint that failed, so the taken columns are looked
/// up again. The insert or update itself stays the only uniqueness check.
async fn conflict_error<'e, E>(executor: E, e: sqlx::Error, key: &UniqueKey) -> ApiError
where
    E: Executor<'e, Database = Sqlite>,
{
    let Some(Constraint::Unique(mut columns)) = constraint_violation(&e) else {
        return e.into();
    };

    let taken = sqlx::query_as::<_, (Option<bool>, Option<bool>)>(
        r#"
        SELECT employee_id = ?, email = ?
        FROM employees
        WHERE (employee_id = ? OR email = ?) AND id IS NOT ?
        "#,
    )
    .bind(key.employee_id.as_deref())
    .bind(key.email.as_deref())
    .bind(key.employee_id.as_deref())
    .bind(key.email.as_deref())
    .bind(key.id)
    .fetch_all(executor)
    .await;

    match taken {
        Ok(rows) => {
            let mut found = Vec::new();
            if rows.iter().any(|(same_id, _)| *same_id == Some(true)) {
                found.push("employee_id".to_string());
            }
            if rows.iter().any(|(_, same_email)| *same_email == Some(true)) {
                found.push("email".to_string());
            }
            if !found.is_empty() {
                columns = found;
            }
        }
        Err(lookup) => warn!(error = %lookup, "Failed to look up conflicting employee fields"),
    }

    let mut errors = FieldErrors::new();
    for column in columns {
        let message = format!(
            "employee with this {} already exists.",
            column.replace('_', " ")
        );
        errors.add(column, message);
    }
    ApiError::Validation(errors)
}

async fn load_employee(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<EmployeeResponse>, sqlx::Error> {
    let sql = format!("{EMPLOYEE_SELECT} WHERE id = ?");
    let Some(employee) = sqlx::query_as::<_, Employee>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let sql = format!("{ATTENDANCE_SELECT} WHERE employee_id = ? ORDER BY id");
    let history = sqlx::query_as::<_, Attendance>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(EmployeeResponse::new(employee, history)))
}

/// List Employees
#[utoipa::path(
    get,
    path = "/api/employees",
    responses(
        (status = 200, description = "All employees with their attendance history", body = [EmployeeResponse])
    ),
    tag = "Employee"
)]
pub async fn list_employees(pool: web::Data<SqlitePool>) -> Result<impl Responder, ApiError> {
    let sql = format!("{EMPLOYEE_SELECT} ORDER BY id");
    let employees = sqlx::query_as::<_, Employee>(&sql)
        .fetch_all(pool.get_ref())
        .await?;

    let sql = format!("{ATTENDANCE_SELECT} ORDER BY id");
    let records = sqlx::query_as::<_, Attendance>(&sql)
        .fetch_all(pool.get_ref())
        .await?;
    debug!(employees = employees.len(), records = records.len(), "Listing employees");

    let mut history: HashMap<i64, Vec<Attendance>> = HashMap::new();
    for record in records {
        history.entry(record.employee).or_default().push(record);
    }

    let data: Vec<EmployeeResponse> = employees
        .into_iter()
        .map(|e| {
            let records = history.remove(&e.id).unwrap_or_default();
            EmployeeResponse::new(e, records)
        })
        .collect();

    Ok(HttpResponse::Ok().json(data))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = EmployeeInput,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Invalid or duplicate fields", body = Object, example = json!({
            "email": ["employee with this email already exists."]
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee"
)]
pub async fn create_employee(
    pool: web::Data<SqlitePool>,
    payload: web::Json<EmployeeInput>,
) -> Result<impl Responder, ApiError> {
    let NewEmployee {
        employee_id,
        full_name,
        email,
        department,
    } = payload.into_inner().into_new()?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_id, full_name, email, department, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee_id)
    .bind(&full_name)
    .bind(&email)
    .bind(&department)
    .bind(Utc::now())
    .execute(pool.get_ref())
    .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            let key = UniqueKey {
                id: None,
                employee_id: Some(employee_id),
                email: Some(email),
            };
            return Err(conflict_error(pool.get_ref(), e, &key).await);
        }
    };

    let id = result.last_insert_rowid();
    info!(id, employee_id = %employee_id, "Employee created");

    Ok(HttpResponse::Created().json(EmployeeResponse {
        id,
        employee_id,
        full_name,
        email,
        department,
        attendance_history: Vec::new(),
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(
        ("id", Path, description = "Employee row id")
    ),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "detail": "Not found."
        }))
    ),
    tag = "Employee"
)]
pub async fn get_employee(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();
    let mut conn = pool.acquire().await?;

    let employee = load_employee(&mut conn, id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(employee))
}

async fn write_employee(
    pool: &SqlitePool,
    id: i64,
    input: EmployeeInput,
    mode: WriteMode,
) -> Result<HttpResponse, ApiError> {
    let mut tx = pool.begin().await?;

    // a missing row is reported before anything about the body
    if !row_exists(&mut tx, "employees", id).await? {
        return Err(ApiError::NotFound);
    }

    let changes = match mode {
        WriteMode::Full => EmployeeInput::from(input.into_new()?),
        WriteMode::Partial => input.into_changes()?,
    };
    let key = changes.unique_key(Some(id));

    if let Err(e) = execute_update(&mut *tx, changes.into_update(id)).await {
        return Err(conflict_error(&mut *tx, e, &key).await);
    }

    let employee = load_employee(&mut tx, id).await?.ok_or(ApiError::NotFound)?;
    tx.commit().await?;

    info!(id, ?mode, "Employee updated");
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(
        ("id", Path, description = "Employee row id")
    ),
    request_body = EmployeeInput,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Invalid or duplicate fields"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee"
)]
pub async fn update_employee(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<EmployeeInput>,
) -> Result<impl Responder, ApiError> {
    write_employee(pool.get_ref(), path.into_inner(), payload.into_inner(), WriteMode::Full).await
}

/// Partially update Employee
#[utoipa::path(
    patch,
    path = "/api/employees/{id}",
    params(
        ("id", Path, description = "Employee row id")
    ),
    request_body = EmployeeInput,
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Invalid or duplicate fields"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee"
)]
pub async fn partial_update_employee(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    payload: web::Json<EmployeeInput>,
) -> Result<impl Responder, ApiError> {
    write_employee(pool.get_ref(), path.into_inner(), payload.into_inner(), WriteMode::Partial).await
}

/// Delete Employee and, through the foreign key, all of its attendance
#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(
        ("id", Path, description = "Employee row id")
    ),
    responses(
        (status = 204, description = "Successfully deleted"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "detail": "Not found."
        }))
    ),
    tag = "Employee"
)]
pub async fn delete_employee(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    info!(id, "Employee deleted");
    Ok(HttpResponse::NoContent().finish())
}
