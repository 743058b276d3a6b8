use crate::domain::employee::Position;
use crate::domain::money::Salary;
use crate::domain::ports::{PositionCatalog, StoreRef};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

/// Positions every installation starts with.
pub const DEFAULT_POSITIONS: [(&str, &str, Decimal); 4] = [
    ("MANAGER", "Gym manager", dec!(0)),
    ("PERSONAL_TRAINER", "Personal trainer", dec!(3500)),
    ("RECEPTIONIST", "Front desk receptionist", dec!(1800)),
    ("CLEANER", "Cleaning staff", dec!(1400)),
];

/// Operator-facing management of the position catalog.
pub struct PositionService {
    store: StoreRef,
}

impl PositionService {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// Inserts the default positions that are missing. Returns how many were
    /// added; existing positions keep their salaries.
    pub async fn seed_defaults(&self) -> Result<usize> {
        let mut added = 0;
        for (name, description, salary) in DEFAULT_POSITIONS {
            let position = Position::new(name, Some(description.to_string()), Salary::new(salary)?)?;
            if self.store.insert_position(position).await? {
                added += 1;
            }
        }
        if added > 0 {
            info!(added, "Seeded default positions");
        }
        Ok(added)
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<String>,
        base_salary: Decimal,
    ) -> Result<Position> {
        let position = Position::new(name, description, Salary::new(base_salary)?)?;
        if !self.store.insert_position(position.clone()).await? {
            return Err(PaymentError::Conflict(format!(
                "Position {name} already exists"
            )));
        }
        info!(position = %position.name, salary = %position.base_salary, "Created position");
        Ok(position)
    }

    /// Changes salary and/or description. The name cannot change.
    pub async fn update(
        &self,
        name: &str,
        base_salary: Option<Decimal>,
        description: Option<String>,
    ) -> Result<Position> {
        let mut position = self
            .store
            .get_position(name)
            .await?
            .ok_or_else(|| PaymentError::not_found("Position", name))?;
        if let Some(salary) = base_salary {
            position.base_salary = Salary::new(salary)?;
        }
        if description.is_some() {
            position.description = description;
        }
        if !self.store.replace_position(position.clone()).await? {
            return Err(PaymentError::not_found("Position", name));
        }
        info!(position = %position.name, salary = %position.base_salary, "Updated position");
        Ok(position)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        if !self.store.remove_position(name).await? {
            return Err(PaymentError::not_found("Position", name));
        }
        info!(position = name, "Deleted position");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Position>> {
        self.store.all_positions().await
    }

    /// Salary for a payment: unassigned or unknown positions pay zero.
    pub async fn salary_for(&self, employee_id: &str, position_name: Option<&str>) -> Result<Salary> {
        let Some(name) = position_name else {
            warn!(employee_id, "Employee has no position, paying 0");
            return Ok(Salary::ZERO);
        };
        match self.store.get_position(name).await? {
            Some(position) => Ok(position.base_salary),
            None => {
                warn!(employee_id, position = name, "Position not found, paying 0");
                Ok(Salary::ZERO)
            }
        }
    }
}
