//! Validation utilities for stock operations
//!
//! Pure checks shared by the services and any client that wants to reject
//! bad input before a round trip.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{ItemPatch, NewItem};

/// Maximum length of item and recipe codes
pub const MAX_CODE_LENGTH: usize = 50;

/// Decimal places kept for stock quantities (`NUMERIC(18, 4)`)
pub const QUANTITY_SCALE: u32 = 4;

/// Largest quantity a stock column can hold: 99,999,999,999,999.9999
pub fn max_quantity() -> Decimal {
    Decimal::new(999_999_999_999_999_999, QUANTITY_SCALE)
}

/// Validate that a quantity fits the stock columns (at most four decimal
/// places, no larger than [`max_quantity`])
pub fn validate_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity.normalize().scale() > QUANTITY_SCALE {
        return Err("Quantity must have at most 4 decimal places");
    }
    if quantity.abs() > max_quantity() {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Validate a stock movement amount (strictly positive and storable)
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    validate_quantity(amount)
}

/// Validate a serving count for cooking
pub fn validate_serving_count(serving_count: u32) -> Result<(), &'static str> {
    if serving_count == 0 {
        return Err("Serving count must be greater than zero");
    }
    Ok(())
}

/// Validate that a transfer moves stock between two different branches
pub fn validate_transfer_branches(from_branch: Uuid, to_branch: Uuid) -> Result<(), &'static str> {
    if from_branch == to_branch {
        return Err("Source and destination branch must be different");
    }
    Ok(())
}

/// Validate item code format (non-blank, bounded, no surrounding whitespace)
pub fn validate_item_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("Code is required");
    }
    if code.len() > MAX_CODE_LENGTH {
        return Err("Code must be at most 50 characters");
    }
    if code.trim() != code {
        return Err("Code must not start or end with whitespace");
    }
    Ok(())
}

fn validate_required(value: &str, message: &'static str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err(message);
    }
    Ok(())
}

/// Validate a new item. Returns the offending field with the message.
pub fn validate_new_item(item: &NewItem) -> Result<(), (&'static str, &'static str)> {
    validate_item_code(&item.code).map_err(|m| ("code", m))?;
    validate_required(&item.name, "Name is required").map_err(|m| ("name", m))?;
    validate_required(&item.unit, "Unit is required").map_err(|m| ("unit", m))?;
    if item.lead_time < 0 {
        return Err(("lead_time", "Lead time cannot be negative"));
    }
    if item.opening_stock < Decimal::ZERO {
        return Err(("opening_stock", "Opening stock cannot be negative"));
    }
    validate_quantity(item.opening_stock).map_err(|m| ("opening_stock", m))?;
    Ok(())
}

/// Validate the fields present in an item patch
pub fn validate_item_patch(patch: &ItemPatch) -> Result<(), (&'static str, &'static str)> {
    if patch.is_empty() {
        return Err(("patch", "At least one field must be provided"));
    }
    if let Some(code) = &patch.code {
        validate_item_code(code).map_err(|m| ("code", m))?;
    }
    if let Some(name) = &patch.name {
        validate_required(name, "Name is required").map_err(|m| ("name", m))?;
    }
    if let Some(unit) = &patch.unit {
        validate_required(unit, "Unit is required").map_err(|m| ("unit", m))?;
    }
    if let Some(lead_time) = patch.lead_time {
        if lead_time < 0 {
            return Err(("lead_time", "Lead time cannot be negative"));
        }
    }
    Ok(())
}
