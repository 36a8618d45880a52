use crate::attendance::{
    AttendanceRecord, CheckOutUpdate, EmployeeShift, NewAttendance, StoreOutcome,
};
use crate::error::{Error, Result};
use crate::AttendanceStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// An in-memory implementation of the AttendanceStore trait
///
/// Meant for tests and local runs. One attendance per employee, company and
/// date; a second check-in on the same day reports `AlreadyExists`.
#[derive(Debug, Clone)]
pub struct MemoryAttendanceStore {
    employees: Arc<RwLock<HashMap<String, EmployeeShift>>>,
    attendance: Arc<RwLock<Vec<AttendanceRecord>>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self {
            employees: Arc::new(RwLock::new(HashMap::new())),
            attendance: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers or replaces an employee's shift
    pub fn insert_employee(&self, shift: EmployeeShift) -> Result<()> {
        let mut employees = self
            .employees
            .write()
            .map_err(|e| Error::Internal(format!("employee lock poisoned: {}", e)))?;
        employees.insert(shift.employee_id.clone(), shift);
        Ok(())
    }

    /// All attendance records for an employee, oldest first
    pub fn attendance_for(&self, employee_id: &str) -> Result<Vec<AttendanceRecord>> {
        let attendance = self
            .attendance
            .read()
            .map_err(|e| Error::Internal(format!("attendance lock poisoned: {}", e)))?;
        Ok(attendance
            .iter()
            .filter(|record| record.employee_id == employee_id)
            .cloned()
            .collect())
    }
}

impl Default for MemoryAttendanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn find_employee(&self, employee_id: &str) -> Result<Option<EmployeeShift>> {
        let employees = self
            .employees
            .read()
            .map_err(|e| Error::DownstreamPersistenceFailure(e.to_string()))?;
        Ok(employees.get(employee_id).cloned())
    }

    async fn create_check_in(&self, check_in: NewAttendance) -> Result<StoreOutcome> {
        let mut attendance = self
            .attendance
            .write()
            .map_err(|e| Error::DownstreamPersistenceFailure(e.to_string()))?;

        let exists = attendance.iter().any(|record| {
            record.employee_id == check_in.employee_id
                && record.company_id == check_in.company_id
                && record.date == check_in.date
        });
        if exists {
            return Ok(StoreOutcome::AlreadyExists);
        }

        attendance.push(AttendanceRecord::open(Uuid::new_v4(), check_in));
        Ok(StoreOutcome::Written)
    }

    async fn find_open_attendance(
        &self,
        employee_id: &str,
        company_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let attendance = self
            .attendance
            .read()
            .map_err(|e| Error::DownstreamPersistenceFailure(e.to_string()))?;

        // Latest match wins.
        Ok(attendance
            .iter()
            .rev()
            .find(|record| {
                record.employee_id == employee_id
                    && record.company_id == company_id
                    && record.date == date
                    && record.is_open()
            })
            .cloned())
    }

    async fn record_check_out(
        &self,
        attendance_id: Uuid,
        update: CheckOutUpdate,
    ) -> Result<StoreOutcome> {
        let mut attendance = self
            .attendance
            .write()
            .map_err(|e| Error::DownstreamPersistenceFailure(e.to_string()))?;

        match attendance.iter_mut().find(|record| record.id == attendance_id) {
            Some(record) if record.is_open() => {
                record.status = update.status;
                record.check_out = Some(update);
                Ok(StoreOutcome::Written)
            }
            Some(_) => Ok(StoreOutcome::AlreadyExists),
            None => Ok(StoreOutcome::NotFound),
        }
    }
}
