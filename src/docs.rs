use crate::api::attendance::AttendanceInput;
use crate::api::employee::{EmployeeInput, EmployeeResponse};
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::employee::Employee;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance Tracker API",
        version = "0.1.0",
        description = r#"
## Employee Attendance Tracker

Keeps a register of employees and one attendance mark per employee per day.

### Resources
- **Employees**: create, update, list, view and delete employee records.
  Every employee carries its `attendance_history`. Deleting an employee deletes its attendance.
- **Attendance**: mark an employee `Present` or `Absent` for a date.
  A second mark for the same employee and date is rejected.

### Errors
- `400` with a field -> messages object, e.g. `{"email": ["Enter a valid email address."]}`
- `404` with `{"detail": "Not found."}`
"#,
    ),
    paths(
        crate::api::root::api_root,

        crate::api::employee::list_employees,
        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::partial_update_employee,
        crate::api::employee::delete_employee,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::partial_update_attendance,
        crate::api::attendance::delete_attendance
    ),
    components(
        schemas(
            Employee,
            EmployeeInput,
            EmployeeResponse,
            Attendance,
            AttendanceInput,
            AttendanceStatus
        )
    ),
    tags(
        (name = "Root", description = "API index"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;
